//! Artifact identity type definitions

use crate::Version;
use mdk_errors::ManifestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of artifact categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// A code module exporting and importing packages
    Module,
    /// A composite of other artifacts
    Plan,
    /// A set of configuration properties
    Configuration,
    /// A named, versioned group of modules that can be imported as one unit
    Library,
}

impl ArtifactType {
    /// Stable string form used in identities and descriptors
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Plan => "plan",
            Self::Configuration => "configuration",
            Self::Library => "library",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(Self::Module),
            "plan" => Ok(Self::Plan),
            "configuration" | "config" => Ok(Self::Configuration),
            "library" => Ok(Self::Library),
            other => Err(ManifestError::Invalid {
                message: format!("unknown artifact type '{other}'"),
            }),
        }
    }
}

/// Immutable identity of an install artifact
///
/// Two artifacts are the same iff type, name, version and scope all match.
/// Artifacts sharing a non-null scope are isolated from the rest of the
/// graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    artifact_type: ArtifactType,
    name: String,
    version: Version,
    scope_name: Option<String>,
}

impl ArtifactIdentity {
    /// Create an unscoped identity
    pub fn new(artifact_type: ArtifactType, name: impl Into<String>, version: Version) -> Self {
        Self {
            artifact_type,
            name: name.into(),
            version,
            scope_name: None,
        }
    }

    /// Create a copy of this identity in the given scope
    #[must_use]
    pub fn scoped(&self, scope_name: Option<String>) -> Self {
        Self {
            scope_name,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        self.artifact_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }

    /// Check if both identities are visible to each other under scoping
    ///
    /// Unscoped artifacts are visible to everyone; scoped artifacts only to
    /// artifacts of the same scope and to unscoped artifacts they import.
    #[must_use]
    pub fn can_see(&self, exporter: &ArtifactIdentity) -> bool {
        match (&self.scope_name, &exporter.scope_name) {
            (_, None) => true,
            (Some(mine), Some(theirs)) => mine == theirs,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' version '{}'", self.artifact_type, self.name, self.version)?;
        if let Some(scope) = &self.scope_name {
            write!(f, " in scope '{scope}'")?;
        }
        Ok(())
    }
}
