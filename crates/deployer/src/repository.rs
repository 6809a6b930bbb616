//! Artifact repositories that plan members and libraries are fetched from

use mdk_errors::Error;
use mdk_manifest::ArtifactDescriptor;
use mdk_resolver::{LibraryProvider, ResolvedLibrary};
use mdk_types::{ArtifactType, VersionRange};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::fs;

/// A descriptor known to a repository and the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    pub descriptor: ArtifactDescriptor,
    pub source: PathBuf,
}

/// Lookup of installable artifacts by type, name and version range
pub trait ArtifactRepository: Send + Sync {
    /// The highest version of the named artifact within `range`
    fn find(
        &self,
        artifact_type: ArtifactType,
        name: &str,
        range: &VersionRange,
    ) -> Option<RepositoryEntry>;

    fn entries(&self) -> Vec<RepositoryEntry>;
}

/// Repository held in memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    entries: RwLock<Vec<RepositoryEntry>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing one with the same identity
    pub fn insert(&self, descriptor: ArtifactDescriptor, source: impl Into<PathBuf>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let identity = descriptor.identity();
        entries.retain(|e| e.descriptor.identity() != identity);
        entries.push(RepositoryEntry {
            descriptor,
            source: source.into(),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactRepository for InMemoryRepository {
    fn find(
        &self,
        artifact_type: ArtifactType,
        name: &str,
        range: &VersionRange,
    ) -> Option<RepositoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| {
                e.descriptor.artifact_type == artifact_type
                    && e.descriptor.name == name
                    && range.includes(&e.descriptor.version)
            })
            .max_by(|a, b| a.descriptor.version.cmp(&b.descriptor.version))
            .cloned()
    }

    fn entries(&self) -> Vec<RepositoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Repository backed by a directory of TOML descriptors
///
/// The directory is scanned once; files that are not valid descriptors are
/// skipped with a warning.
#[derive(Debug)]
pub struct DirectoryRepository {
    root: PathBuf,
    index: InMemoryRepository,
}

impl DirectoryRepository {
    /// Scan `root` for `*.toml` descriptors
    ///
    /// A missing directory gives an empty repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub async fn scan(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        let index = InMemoryRepository::new();
        if !fs::try_exists(&root).await.unwrap_or(false) {
            tracing::debug!(root = %root.display(), "repository directory does not exist");
            return Ok(Self { root, index });
        }

        let mut dir = fs::read_dir(&root)
            .await
            .map_err(|e| Error::io_with_path(&e, &root))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &root))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }
            match ArtifactDescriptor::from_file(&path).await {
                Ok(descriptor) => index.insert(descriptor, path),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping invalid descriptor");
                }
            }
        }

        tracing::info!(root = %root.display(), artifacts = index.len(), "repository scanned");
        Ok(Self { root, index })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactRepository for DirectoryRepository {
    fn find(
        &self,
        artifact_type: ArtifactType,
        name: &str,
        range: &VersionRange,
    ) -> Option<RepositoryEntry> {
        self.index.find(artifact_type, name, range)
    }

    fn entries(&self) -> Vec<RepositoryEntry> {
        self.index.entries()
    }
}

/// Serves library definitions out of a repository
///
/// A library offers its declared packages plus every export of its member
/// modules found in the same repository.
#[derive(Clone)]
pub struct RepositoryLibraries {
    repository: Arc<dyn ArtifactRepository>,
}

impl RepositoryLibraries {
    pub fn new(repository: Arc<dyn ArtifactRepository>) -> Self {
        Self { repository }
    }
}

impl LibraryProvider for RepositoryLibraries {
    fn find_library(
        &self,
        name: &str,
        range: &VersionRange,
    ) -> Result<Option<ResolvedLibrary>, Error> {
        let Some(entry) = self.repository.find(ArtifactType::Library, name, range) else {
            return Ok(None);
        };
        let definition = entry.descriptor.library.unwrap_or_default();

        let members: Vec<ArtifactDescriptor> = definition
            .modules
            .iter()
            .filter_map(|member| {
                let found = self
                    .repository
                    .find(ArtifactType::Module, &member.name, &member.range);
                if found.is_none() {
                    tracing::warn!(library = name, module = %member.name, "library member not in repository");
                }
                found.map(|e| e.descriptor)
            })
            .collect();
        let exports = members
            .iter()
            .filter_map(|m| m.manifest.as_ref())
            .flat_map(|m| m.exports.iter());

        Ok(Some(ResolvedLibrary::from_definition(
            name,
            entry.descriptor.version.clone(),
            &definition,
            exports,
        )))
    }
}
