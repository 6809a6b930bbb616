//! Artifact descriptor documents

use mdk_errors::{Error, ManifestError};
use mdk_types::{ArtifactIdentity, ArtifactType, Properties, Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Manifest;

/// How a plan supplies libraries its modules import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provisioning {
    /// Add imported libraries to the plan's graph
    Auto,
    /// Expect imported libraries to be deployed already
    Disabled,
    /// Use the enclosing plan's policy, `Auto` at the top
    #[default]
    Inherit,
}

impl Provisioning {
    /// Resolve `Inherit` against the parent's effective policy
    #[must_use]
    pub fn effective(self, parent: Provisioning) -> Provisioning {
        match (self, parent) {
            (Self::Inherit, Self::Inherit) => Self::Auto,
            (Self::Inherit, parent) => parent,
            (own, _) => own,
        }
    }
}

/// Reference from a plan to one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpecification {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
    /// Deployment properties passed to the member
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl ArtifactSpecification {
    pub fn new(artifact_type: ArtifactType, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            artifact_type,
            name: name.into(),
            range,
            properties: Properties::new(),
        }
    }
}

impl std::fmt::Display for ArtifactSpecification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' {}", self.artifact_type, self.name, self.range)
    }
}

/// Plan membership and behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDescriptor {
    /// Members share a scope isolated from the rest of the graph
    #[serde(default)]
    pub scoped: bool,
    /// Members start and stop as a unit
    #[serde(default)]
    pub atomic: bool,
    #[serde(default)]
    pub provisioning: Provisioning,
    #[serde(default)]
    pub children: Vec<ArtifactSpecification>,
}

/// Member module of a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryModule {
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
}

/// Package a library offers to modules importing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryPackage {
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
}

/// A named, versioned group of modules imported as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDefinition {
    #[serde(default)]
    pub modules: Vec<LibraryModule>,
    /// Packages offered in addition to the member modules' own exports
    #[serde(default)]
    pub packages: Vec<LibraryPackage>,
}

/// A complete artifact descriptor document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub name: String,
    pub version: Version,
    /// Deployment properties, or the published values of a configuration
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<LibraryDefinition>,
}

impl ArtifactDescriptor {
    /// Unscoped identity of the described artifact
    #[must_use]
    pub fn identity(&self) -> ArtifactIdentity {
        ArtifactIdentity::new(self.artifact_type, self.name.clone(), self.version.clone())
    }

    /// Module manifest, empty when the descriptor declares none
    #[must_use]
    pub fn module_manifest(&self) -> Manifest {
        self.manifest.clone().unwrap_or_default()
    }

    /// Parse and validate a descriptor from TOML
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Parse` for malformed TOML and
    /// `ManifestError::Invalid` for a descriptor that fails validation.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, Error> {
        let descriptor: Self = toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Read a descriptor from disk on the calling thread
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` carrying the path if the file cannot be read, and
    /// the errors of [`ArtifactDescriptor::from_toml`] otherwise.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io_with_path(&e, path))?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Read a descriptor from disk asynchronously
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactDescriptor::read`].
    pub async fn from_file(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Serialize to a TOML string
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Invalid` if the descriptor cannot be serialized.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| {
            ManifestError::Invalid {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Validate descriptor fields
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Invalid` if the name is empty or a section
    /// required by, or foreign to, the artifact type is missing or present.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| -> Error { ManifestError::Invalid { message }.into() };

        if self.name.trim().is_empty() {
            return Err(invalid("artifact name cannot be empty".to_string()));
        }

        let identity = self.identity();
        match self.artifact_type {
            ArtifactType::Plan if self.plan.is_none() => {
                return Err(invalid(format!("{identity} has no [plan] section")));
            }
            ArtifactType::Library if self.library.is_none() => {
                return Err(invalid(format!("{identity} has no [library] section")));
            }
            ArtifactType::Module | ArtifactType::Configuration | ArtifactType::Library
                if self.plan.is_some() =>
            {
                return Err(invalid(format!("{identity} is not a plan but has a [plan] section")));
            }
            ArtifactType::Configuration | ArtifactType::Plan | ArtifactType::Library
                if self.manifest.is_some() =>
            {
                return Err(invalid(format!(
                    "{identity} is not a module but has a [manifest] section"
                )));
            }
            _ => {}
        }

        if let Some(plan) = &self.plan {
            if let Some(child) = plan.children.iter().find(|c| c.name.trim().is_empty()) {
                return Err(invalid(format!(
                    "{identity} has a {} child without a name",
                    child.artifact_type
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
type = "plan"
name = "shop"
version = "2.1.0"

[plan]
scoped = true
atomic = true

[[plan.children]]
type = "module"
name = "shop.web"
range = "[1.0,2.0)"

[[plan.children]]
type = "configuration"
name = "shop.config"
"#;

    #[test]
    fn test_parse_plan() {
        let descriptor = ArtifactDescriptor::from_toml(PLAN, "shop.toml").unwrap();
        let plan = descriptor.plan.as_ref().unwrap();
        assert!(plan.scoped && plan.atomic);
        assert_eq!(plan.provisioning, Provisioning::Inherit);
        assert_eq!(plan.children.len(), 2);
        assert!(plan.children[1].range.is_unbounded());
    }

    #[test]
    fn test_plan_without_section_is_invalid() {
        let err = ArtifactDescriptor::from_toml(
            "type = \"plan\"\nname = \"x\"\nversion = \"1.0\"\n",
            "x.toml",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Manifest(ManifestError::Invalid { .. })));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = ArtifactDescriptor::from_toml("type = ", "bad.toml").unwrap_err();
        assert!(matches!(err, Error::Manifest(ManifestError::Parse { .. })));
    }

    #[test]
    fn test_provisioning_inheritance() {
        assert_eq!(
            Provisioning::Inherit.effective(Provisioning::Disabled),
            Provisioning::Disabled
        );
        assert_eq!(
            Provisioning::Inherit.effective(Provisioning::Inherit),
            Provisioning::Auto
        );
        assert_eq!(
            Provisioning::Disabled.effective(Provisioning::Auto),
            Provisioning::Disabled
        );
    }
}
