use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Install pipeline stage events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    StageStarted {
        stage: String,
        artifact: String,
    },

    StageCompleted {
        stage: String,
        artifact: String,
        duration_ms: u64,
    },

    StageFailed {
        stage: String,
        artifact: String,
        failure: FailureContext,
    },

    /// A compensation stage ran after a failure in the guarded stage
    CompensationRan { stage: String, artifact: String },
}
