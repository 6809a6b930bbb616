use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Resolver domain events for wiring imports to exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    /// Import expansion replaced library imports with package imports
    ImportsExpanded {
        artifact: String,
        libraries: usize,
        packages: usize,
    },

    /// Resolution of a set of modules started
    ResolutionStarted { modules: Vec<String> },

    /// Resolution completed successfully
    ResolutionCompleted {
        resolved: usize,
        wirings: usize,
        duration_ms: u64,
    },

    /// Resolution failed; `failures` holds one line per unsatisfied constraint
    ResolutionFailed {
        artifact: String,
        failures: Vec<String>,
        failure: FailureContext,
    },

    /// Uses-constraint analysis found a split package space
    UsesConflictDetected {
        package: String,
        first: String,
        second: String,
    },

    /// Uses-constraint analysis could not identify a root cause
    AnalysisInconclusive { artifact: String },
}
