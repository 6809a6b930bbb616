//! Version and version range parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VersionError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version range: {input}")]
    InvalidRange { input: String },

    #[error("version parse error: {message}")]
    ParseError { message: String },
}

impl UserFacingError for VersionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVersion { .. } | Self::ParseError { .. } => {
                Some("Use versions of the form major.minor.micro.qualifier, such as 1.2.0 or 2.0.0.RELEASE.")
            }
            Self::InvalidRange { .. } => {
                Some("Use interval notation such as [1.0,2.0) or a bare minimum version such as 1.0.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidVersion { .. } => "version.invalid_version",
            Self::InvalidRange { .. } => "version.invalid_range",
            Self::ParseError { .. } => "version.parse_error",
        };
        Some(code)
    }
}
