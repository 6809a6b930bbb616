use mdk_types::ArtifactState;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Install artifact lifecycle events
///
/// One `Transition` is emitted for every state change an artifact goes
/// through, in the order the changes happen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// Artifact moved between two lifecycle states
    Transition {
        artifact: String,
        from: ArtifactState,
        to: ArtifactState,
    },

    /// A lifecycle operation failed and the artifact was rolled back
    OperationFailed {
        artifact: String,
        operation: String,
        failure: FailureContext,
    },

    /// The runtime aborted a start without raising an error
    StartAborted { artifact: String },

    /// A refresh request was accepted for the artifact
    RefreshRequested { artifact: String },
}

impl LifecycleEvent {
    /// Create a transition event
    #[must_use]
    pub fn transition(artifact: impl Into<String>, from: ArtifactState, to: ArtifactState) -> Self {
        Self::Transition {
            artifact: artifact.into(),
            from,
            to,
        }
    }

    /// Artifact this event refers to
    #[must_use]
    pub fn artifact(&self) -> &str {
        match self {
            Self::Transition { artifact, .. }
            | Self::OperationFailed { artifact, .. }
            | Self::StartAborted { artifact }
            | Self::RefreshRequested { artifact } => artifact,
        }
    }
}
