//! Staging area holding the deployer's copies of deployed files

use async_trait::async_trait;
use mdk_artifact::StagedArtifact;
use mdk_errors::{Error, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Storage for staged copies of deployed artifacts
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Copy `source` into the staging area
    async fn stage(&self, source: &Path) -> Result<StagedArtifact, Error>;

    /// Refresh a staged copy from its source
    async fn update(&self, staged: &StagedArtifact) -> Result<(), Error>;

    /// Delete a staged copy
    async fn discard(&self, staged: &StagedArtifact) -> Result<(), Error>;
}

/// Staging area in a local directory
///
/// Every staged copy gets a unique file name so the same source can be
/// staged more than once.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owns(&self, staged: &StagedArtifact) -> bool {
        staged.path().starts_with(&self.root)
    }
}

async fn copy(from: &Path, to: &Path) -> Result<(), Error> {
    match fs::copy(from, to).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::PathNotFound {
            path: from.display().to_string(),
        }
        .into()),
        Err(e) => Err(Error::io_with_path(&e, from)),
    }
}

#[async_trait]
impl ArtifactStorage for DirectoryStorage {
    async fn stage(&self, source: &Path) -> Result<StagedArtifact, Error> {
        let file_name = source
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StorageError::InvalidPath {
                path: source.display().to_string(),
            })?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?;

        let path = self.root.join(format!("{}-{file_name}", Uuid::new_v4()));
        copy(source, &path).await?;
        tracing::debug!(source = %source.display(), staged = %path.display(), "artifact staged");
        Ok(StagedArtifact::new(source, path))
    }

    async fn update(&self, staged: &StagedArtifact) -> Result<(), Error> {
        if !self.owns(staged) {
            return Err(StorageError::NotStaged {
                artifact: staged.source().display().to_string(),
            }
            .into());
        }
        copy(staged.source(), staged.path()).await?;
        tracing::debug!(staged = %staged.path().display(), "staged copy updated");
        Ok(())
    }

    async fn discard(&self, staged: &StagedArtifact) -> Result<(), Error> {
        if !self.owns(staged) {
            return Ok(());
        }
        match fs::remove_file(staged.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, staged.path())),
        }
    }
}
