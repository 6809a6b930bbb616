//! Deployment URI normalization

use mdk_errors::{DeploymentError, Error};
use std::fmt;
use std::path::{Component, Path, PathBuf};

const FILE_SCHEME: &str = "file:";

/// A normalized `file:` URI naming a descriptor on disk
///
/// Plain paths are accepted and treated as `file:` URIs. Relative paths are
/// made absolute against the working directory and `.`/`..` segments are
/// removed, so two spellings of one location normalize to the same URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactUri {
    path: PathBuf,
}

impl ArtifactUri {
    /// # Errors
    ///
    /// Returns `DeploymentError::InvalidUri` for an empty URI, a scheme other
    /// than `file`, or a path that climbs above the filesystem root.
    pub fn parse(uri: &str) -> Result<Self, Error> {
        let invalid = |message: &str| -> Error {
            DeploymentError::InvalidUri {
                uri: uri.to_string(),
                message: message.to_string(),
            }
            .into()
        };

        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty URI"));
        }

        let raw = match trimmed.strip_prefix(FILE_SCHEME) {
            Some(rest) => rest.strip_prefix("//").unwrap_or(rest),
            None if has_scheme(trimmed) => return Err(invalid("only file URIs can be deployed")),
            None => trimmed,
        };
        if raw.is_empty() {
            return Err(invalid("URI has no path"));
        }

        let path = Path::new(raw);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| invalid(&format!("cannot resolve relative path: {e}")))?
                .join(path)
        };

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(invalid("path escapes the filesystem root"));
                    }
                }
                other => normalized.push(other),
            }
        }
        if normalized.parent().is_none() {
            return Err(invalid("URI names the filesystem root"));
        }

        Ok(Self { path: normalized })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `scheme:` prefix of at least two characters, so `C:` drive letters pass
fn has_scheme(uri: &str) -> bool {
    uri.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILE_SCHEME}{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spellings_of_one_path_normalize_equal() {
        let a = ArtifactUri::parse("/srv/apps/./shop/../shop.toml").unwrap();
        let b = ArtifactUri::parse("file:/srv/apps/shop.toml").unwrap();
        let c = ArtifactUri::parse("file:///srv/apps/shop.toml").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "file:/srv/apps/shop.toml");
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let uri = ArtifactUri::parse("shop.toml").unwrap();
        assert!(uri.path().is_absolute());
        assert!(uri.path().ends_with("shop.toml"));
    }

    #[test]
    fn test_unusable_uris_are_rejected() {
        for uri in ["", "   ", "http://host/shop.toml", "file:", "/..", "/"] {
            let err = ArtifactUri::parse(uri).unwrap_err();
            assert!(
                matches!(err, Error::Deployment(DeploymentError::InvalidUri { .. })),
                "{uri:?} gave {err:?}"
            );
        }
    }
}
