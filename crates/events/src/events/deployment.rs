use mdk_types::DeploymentIdentity;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Deployment operation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeploymentEvent {
    Started {
        uri: String,
        install_only: bool,
    },

    Completed {
        uri: String,
        identity: DeploymentIdentity,
        duration_ms: u64,
    },

    Failed {
        uri: String,
        failure: FailureContext,
    },

    /// The deployment exceeded its timeout; the work continues in the background
    TimedOut { uri: String, seconds: u64 },

    Undeployed { identity: DeploymentIdentity },

    Updated { identity: DeploymentIdentity },

    /// Refresh of a deployed artifact completed
    Refreshed {
        identity: DeploymentIdentity,
        success: bool,
    },
}
