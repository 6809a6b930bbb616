//! Manifest and descriptor error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse manifest {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid manifest: {message}")]
    Invalid { message: String },

    #[error("manifest missing for {artifact}")]
    Missing { artifact: String },
}

impl ManifestError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Read { .. } => "manifest.read",
            Self::Parse { .. } => "manifest.parse",
            Self::Invalid { .. } => "manifest.invalid",
            Self::Missing { .. } => "manifest.missing",
        };
        Some(code)
    }
}
