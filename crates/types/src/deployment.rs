//! Deployment request and result type definitions

use crate::{ArtifactIdentity, ArtifactType, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Options controlling a single deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOptions {
    /// Stop after the artifact tree is installed and resolved
    #[serde(default)]
    pub install_only: bool,
    /// Redeploy automatically after a restart of the kernel
    #[serde(default = "default_true")]
    pub recoverable: bool,
    /// The deployer owns the staged copy and deletes it on undeploy
    #[serde(default = "default_true")]
    pub deployer_owned: bool,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            install_only: false,
            recoverable: true,
            deployer_owned: true,
        }
    }
}

impl DeploymentOptions {
    /// Options for a deployment that must not start anything
    #[must_use]
    pub fn install_only() -> Self {
        Self {
            install_only: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    #[must_use]
    pub fn with_deployer_owned(mut self, deployer_owned: bool) -> Self {
        self.deployer_owned = deployer_owned;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Identity reported back to the caller of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub artifact_type: ArtifactType,
    pub name: String,
    pub version: Version,
}

impl From<&ArtifactIdentity> for DeploymentIdentity {
    fn from(identity: &ArtifactIdentity) -> Self {
        Self {
            artifact_type: identity.artifact_type(),
            name: identity.name().to_string(),
            version: identity.version().clone(),
        }
    }
}

impl fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.artifact_type, self.name, self.version)
    }
}
