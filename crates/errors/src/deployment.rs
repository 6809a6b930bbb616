//! Deployment pipeline and dependency satisfaction error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum DeploymentError {
    #[error("deployment failed: {message}")]
    Failed { message: String },

    #[error("{message}: {cause}")]
    Wrapped {
        message: String,
        #[source]
        cause: Box<crate::Error>,
    },

    #[error("deployment of {uri} timed out after {seconds}s")]
    Timeout { uri: String, seconds: u64 },

    #[error("not deployed: {uri}")]
    NotDeployed { uri: String },

    #[error("invalid deployment URI {uri}: {message}")]
    InvalidUri { uri: String, message: String },

    #[error("no {artifact_type} artifact named {name} in version range {range}")]
    ArtifactNotFound {
        artifact_type: String,
        name: String,
        range: String,
    },

    #[error("unable to satisfy dependencies of module {name} version {version}: {description}")]
    UnableToSatisfyBundleDependencies {
        name: String,
        version: String,
        description: String,
        failures: Vec<String>,
    },

    #[error("unable to satisfy dependencies of library {name} in range {range}: {description}")]
    UnableToSatisfyLibraryDependencies {
        name: String,
        range: String,
        description: String,
    },

    #[error("unable to satisfy dependencies of plan {name} version {version}: {description}")]
    UnableToSatisfyPlanDependencies {
        name: String,
        version: String,
        description: String,
        failures: Vec<String>,
    },

    #[error("import of package {package} from {first_source} conflicts with import from {second_source}")]
    ImportMergeConflict {
        package: String,
        first_source: String,
        second_source: String,
    },

    #[error("package {package} is exported by both {first} and {second} in scope {scope}")]
    ScopeConflict {
        scope: String,
        package: String,
        first: String,
        second: String,
    },
}

impl DeploymentError {
    /// Whether this error reports unsatisfied dependencies of any kind
    #[must_use]
    pub fn is_unsatisfied_dependencies(&self) -> bool {
        matches!(
            self,
            Self::UnableToSatisfyBundleDependencies { .. }
                | Self::UnableToSatisfyLibraryDependencies { .. }
                | Self::UnableToSatisfyPlanDependencies { .. }
        )
    }
}

impl UserFacingError for DeploymentError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::Wrapped { message, cause } => {
                Cow::Owned(format!("{message}: {}", cause.user_message()))
            }
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } => {
                Some("Increase deployer.timeout_secs or check for listeners that block.")
            }
            Self::UnableToSatisfyBundleDependencies { .. }
            | Self::UnableToSatisfyPlanDependencies { .. } => {
                Some("Deploy the modules that export the missing packages or relax the import ranges.")
            }
            Self::UnableToSatisfyLibraryDependencies { .. } | Self::ArtifactNotFound { .. } => {
                Some("Add the missing artifact to the repository directory.")
            }
            Self::ImportMergeConflict { .. } => {
                Some("Align the version range of the explicit import with the imported library.")
            }
            Self::Wrapped { cause, .. } => cause.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Wrapped { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Failed { .. } => "deployment.failed",
            Self::Wrapped { .. } => "deployment.wrapped",
            Self::Timeout { .. } => "deployment.timeout",
            Self::NotDeployed { .. } => "deployment.not_deployed",
            Self::InvalidUri { .. } => "deployment.invalid_uri",
            Self::ArtifactNotFound { .. } => "deployment.artifact_not_found",
            Self::UnableToSatisfyBundleDependencies { .. } => "deployment.unsatisfied_module",
            Self::UnableToSatisfyLibraryDependencies { .. } => "deployment.unsatisfied_library",
            Self::UnableToSatisfyPlanDependencies { .. } => "deployment.unsatisfied_plan",
            Self::ImportMergeConflict { .. } => "deployment.import_merge_conflict",
            Self::ScopeConflict { .. } => "deployment.scope_conflict",
        };
        Some(code)
    }
}
