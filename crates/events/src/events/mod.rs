use serde::{Deserialize, Serialize};

use crate::EventSource;
use mdk_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the error carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod deployment;
pub mod general;
pub mod lifecycle;
pub mod pipeline;
pub mod resolver;

pub use deployment::*;
pub use general::*;
pub use lifecycle::*;
pub use pipeline::*;
pub use resolver::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Artifact lifecycle transitions
    Lifecycle(LifecycleEvent),

    /// Import expansion and wiring
    Resolver(ResolverEvent),

    /// Install pipeline stages
    Pipeline(PipelineEvent),

    /// Deploy, undeploy, update and refresh operations
    Deployment(DeploymentEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Lifecycle(_) => EventSource::LIFECYCLE,
            Self::Resolver(_) => EventSource::RESOLVER,
            Self::Pipeline(_) => EventSource::PIPELINE,
            Self::Deployment(_) => EventSource::DEPLOYMENT,
        }
    }

    /// Deployment URI or artifact this event concerns
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            Self::General(_)
            | Self::Resolver(
                ResolverEvent::ResolutionStarted { .. }
                | ResolverEvent::ResolutionCompleted { .. }
                | ResolverEvent::UsesConflictDetected { .. },
            ) => None,
            Self::Lifecycle(
                LifecycleEvent::Transition { artifact, .. }
                | LifecycleEvent::OperationFailed { artifact, .. }
                | LifecycleEvent::StartAborted { artifact }
                | LifecycleEvent::RefreshRequested { artifact },
            )
            | Self::Resolver(
                ResolverEvent::ImportsExpanded { artifact, .. }
                | ResolverEvent::ResolutionFailed { artifact, .. }
                | ResolverEvent::AnalysisInconclusive { artifact },
            )
            | Self::Pipeline(
                PipelineEvent::StageStarted { artifact, .. }
                | PipelineEvent::StageCompleted { artifact, .. }
                | PipelineEvent::StageFailed { artifact, .. }
                | PipelineEvent::CompensationRan { artifact, .. },
            ) => Some(artifact.clone()),
            Self::Deployment(
                DeploymentEvent::Started { uri, .. }
                | DeploymentEvent::Completed { uri, .. }
                | DeploymentEvent::Failed { uri, .. }
                | DeploymentEvent::TimedOut { uri, .. },
            ) => Some(uri.clone()),
            Self::Deployment(
                DeploymentEvent::Undeployed { identity }
                | DeploymentEvent::Updated { identity }
                | DeploymentEvent::Refreshed { identity, .. },
            ) => Some(identity.to_string()),
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. } | GeneralEvent::OperationFailed { .. })
            | Self::Lifecycle(LifecycleEvent::OperationFailed { .. })
            | Self::Resolver(ResolverEvent::ResolutionFailed { .. })
            | Self::Pipeline(PipelineEvent::StageFailed { .. })
            | Self::Deployment(DeploymentEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Lifecycle(LifecycleEvent::StartAborted { .. })
            | Self::Resolver(
                ResolverEvent::UsesConflictDetected { .. }
                | ResolverEvent::AnalysisInconclusive { .. },
            )
            | Self::Pipeline(PipelineEvent::CompensationRan { .. })
            | Self::Deployment(DeploymentEvent::TimedOut { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Lifecycle(LifecycleEvent::Transition { .. })
            | Self::Pipeline(PipelineEvent::StageStarted { .. } | PipelineEvent::StageCompleted { .. })
            | Self::Resolver(ResolverEvent::ImportsExpanded { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "mdk::events::general",
            Self::Lifecycle(_) => "mdk::events::lifecycle",
            Self::Resolver(_) => "mdk::events::resolver",
            Self::Pipeline(_) => "mdk::events::pipeline",
            Self::Deployment(_) => "mdk::events::deployment",
        }
    }
}
