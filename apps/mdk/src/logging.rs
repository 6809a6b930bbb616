//! Structured logging integration for events
//!
//! Turns the events emitted by the kernel into tracing records with
//! structured fields, at the level recorded in each event's metadata.

use mdk_events::{
    AppEvent, DeploymentEvent, EventMessage, GeneralEvent, LifecycleEvent, PipelineEvent,
    ResolverEvent,
};
use tracing::{debug, error, info, warn, Level};

/// Record `fields` at `level`, tagged with the event's source, id and subject
macro_rules! record {
    ($level:expr, $meta:expr, $($fields:tt)+) => {
        let level = $level;
        if level == Level::ERROR {
            error!(source = $meta.source.as_str(), event_id = %$meta.event_id, correlation = ?$meta.correlation_id, $($fields)+);
        } else if level == Level::WARN {
            warn!(source = $meta.source.as_str(), event_id = %$meta.event_id, correlation = ?$meta.correlation_id, $($fields)+);
        } else if level == Level::INFO {
            info!(source = $meta.source.as_str(), event_id = %$meta.event_id, correlation = ?$meta.correlation_id, $($fields)+);
        } else {
            debug!(source = $meta.source.as_str(), event_id = %$meta.event_id, correlation = ?$meta.correlation_id, $($fields)+);
        }
    };
}

/// Log an event using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let level = meta.tracing_level();

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                record!(level, meta, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                record!(level, meta, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                record!(level, meta, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                record!(level, meta, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                record!(level, meta, operation = %operation, success, "Operation completed");
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                record!(
                    level,
                    meta,
                    operation = %operation,
                    code = ?failure.code,
                    hint = ?failure.hint,
                    "Operation failed: {}",
                    failure.message
                );
            }
            GeneralEvent::ConfigurationValidated { source, warnings } => {
                record!(level, meta, config = %source, warnings = warnings.len(), "Configuration validated");
            }
        },

        AppEvent::Lifecycle(event) => match event {
            LifecycleEvent::Transition { artifact, from, to } => {
                record!(level, meta, artifact = %artifact, from = %from, to = %to, "Artifact transition");
            }
            LifecycleEvent::OperationFailed {
                artifact,
                operation,
                failure,
            } => {
                record!(
                    level,
                    meta,
                    artifact = %artifact,
                    operation = %operation,
                    code = ?failure.code,
                    "Lifecycle operation failed: {}",
                    failure.message
                );
            }
            LifecycleEvent::StartAborted { artifact } => {
                record!(level, meta, artifact = %artifact, "Start aborted");
            }
            LifecycleEvent::RefreshRequested { artifact } => {
                record!(level, meta, artifact = %artifact, "Refresh requested");
            }
        },

        AppEvent::Resolver(event) => match event {
            ResolverEvent::ImportsExpanded {
                artifact,
                libraries,
                packages,
            } => {
                record!(level, meta, artifact = %artifact, libraries, packages, "Imports expanded");
            }
            ResolverEvent::ResolutionStarted { modules } => {
                record!(level, meta, modules = modules.len(), "Resolution started");
            }
            ResolverEvent::ResolutionCompleted {
                resolved,
                wirings,
                duration_ms,
            } => {
                record!(level, meta, resolved, wirings, duration_ms, "Resolution completed");
            }
            ResolverEvent::ResolutionFailed {
                artifact,
                failures,
                failure,
            } => {
                record!(
                    level,
                    meta,
                    artifact = %artifact,
                    failures = ?failures,
                    "Resolution failed: {}",
                    failure.message
                );
            }
            ResolverEvent::UsesConflictDetected {
                package,
                first,
                second,
            } => {
                record!(level, meta, package = %package, first = %first, second = %second, "Uses conflict");
            }
            ResolverEvent::AnalysisInconclusive { artifact } => {
                record!(level, meta, artifact = %artifact, "Uses analysis inconclusive");
            }
        },

        AppEvent::Pipeline(event) => match event {
            PipelineEvent::StageStarted { stage, artifact } => {
                record!(level, meta, stage = %stage, artifact = %artifact, "Stage started");
            }
            PipelineEvent::StageCompleted {
                stage,
                artifact,
                duration_ms,
            } => {
                record!(level, meta, stage = %stage, artifact = %artifact, duration_ms, "Stage completed");
            }
            PipelineEvent::StageFailed {
                stage,
                artifact,
                failure,
            } => {
                record!(
                    level,
                    meta,
                    stage = %stage,
                    artifact = %artifact,
                    code = ?failure.code,
                    "Stage failed: {}",
                    failure.message
                );
            }
            PipelineEvent::CompensationRan { stage, artifact } => {
                record!(level, meta, stage = %stage, artifact = %artifact, "Compensation ran");
            }
        },

        AppEvent::Deployment(event) => match event {
            DeploymentEvent::Started { uri, install_only } => {
                record!(level, meta, uri = %uri, install_only, "Deployment started");
            }
            DeploymentEvent::Completed {
                uri,
                identity,
                duration_ms,
            } => {
                record!(level, meta, uri = %uri, identity = %identity, duration_ms, "Deployment completed");
            }
            DeploymentEvent::Failed { uri, failure } => {
                record!(
                    level,
                    meta,
                    uri = %uri,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    hint = ?failure.hint,
                    "Deployment failed: {}",
                    failure.message
                );
            }
            DeploymentEvent::TimedOut { uri, seconds } => {
                record!(level, meta, uri = %uri, seconds, "Deployment timed out");
            }
            DeploymentEvent::Undeployed { identity } => {
                record!(level, meta, identity = %identity, "Undeployed");
            }
            DeploymentEvent::Updated { identity } => {
                record!(level, meta, identity = %identity, "Updated");
            }
            DeploymentEvent::Refreshed { identity, success } => {
                record!(level, meta, identity = %identity, success, "Refreshed");
            }
        },
    }
}
