//! Artifact lifecycle error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("cannot {operation} {artifact} while it is {state}")]
    InvalidTransition {
        artifact: String,
        state: String,
        operation: String,
    },

    #[error("listener failed during {event} of {artifact}: {message}")]
    ListenerFailed {
        artifact: String,
        event: String,
        message: String,
    },

    #[error("runtime failed to {operation} {artifact}: {message}")]
    RuntimeFailed {
        artifact: String,
        operation: String,
        message: String,
    },

    #[error("start of {artifact} was aborted")]
    StartAborted { artifact: String },

    #[error("{artifact} failed to {operation}: {message}")]
    ChildFailed {
        artifact: String,
        operation: String,
        message: String,
    },
}

impl LifecycleError {
    #[must_use]
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidTransition { .. } => {
                Some("Wait for the in-flight lifecycle operation to complete and retry.")
            }
            Self::ListenerFailed { .. } => Some("Inspect the failing lifecycle listener."),
            _ => None,
        }
    }

    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidTransition { .. } => "lifecycle.invalid_transition",
            Self::ListenerFailed { .. } => "lifecycle.listener_failed",
            Self::RuntimeFailed { .. } => "lifecycle.runtime_failed",
            Self::StartAborted { .. } => "lifecycle.start_aborted",
            Self::ChildFailed { .. } => "lifecycle.child_failed",
        };
        Some(code)
    }
}
