use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Level;
use uuid::Uuid;

use crate::AppEvent;

/// Metadata envelope of every emitted event
///
/// The correlation id is the deployment URI or artifact the event concerns,
/// so a consumer can group everything one deployment produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub event_id: Uuid,
    /// Deployment URI or artifact the event belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub source: EventSource,
}

impl EventMeta {
    #[must_use]
    pub fn new(level: impl Into<EventLevel>, source: EventSource) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            correlation_id: None,
            timestamp: Utc::now(),
            level: level.into(),
            source,
        }
    }

    /// Metadata derived from the event: its level, source and subject
    #[must_use]
    pub fn for_event(event: &AppEvent) -> Self {
        let meta = Self::new(event.log_level(), event.event_source());
        match event.correlation_id() {
            Some(id) => meta.with_correlation_id(id),
            None => meta,
        }
    }

    /// Level to record the event at
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        self.level.into()
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Severity of an event
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<EventLevel> for Level {
    fn from(level: EventLevel) -> Self {
        match level {
            EventLevel::Trace => Level::TRACE,
            EventLevel::Debug => Level::DEBUG,
            EventLevel::Info => Level::INFO,
            EventLevel::Warn => Level::WARN,
            EventLevel::Error => Level::ERROR,
        }
    }
}

impl From<Level> for EventLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => EventLevel::Trace,
            Level::DEBUG => EventLevel::Debug,
            Level::INFO => EventLevel::Info,
            Level::WARN => EventLevel::Warn,
            Level::ERROR => EventLevel::Error,
        }
    }
}

/// Kernel layer that emitted the event
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventSource(Cow<'static, str>);

impl EventSource {
    pub const GENERAL: Self = Self::const_str("general");
    pub const LIFECYCLE: Self = Self::const_str("lifecycle");
    pub const RESOLVER: Self = Self::const_str("resolver");
    pub const PIPELINE: Self = Self::const_str("pipeline");
    pub const DEPLOYMENT: Self = Self::const_str("deployment");

    const fn const_str(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeploymentEvent, GeneralEvent};

    #[test]
    fn test_deployment_events_correlate_by_uri() {
        let meta = EventMeta::for_event(&AppEvent::Deployment(DeploymentEvent::TimedOut {
            uri: "file:/srv/app.toml".into(),
            seconds: 5,
        }));
        assert_eq!(meta.tracing_level(), Level::WARN);
        assert_eq!(meta.source.as_str(), "deployment");
        assert_eq!(meta.correlation_id.as_deref(), Some("file:/srv/app.toml"));
    }

    #[test]
    fn test_general_events_are_uncorrelated() {
        let meta = EventMeta::for_event(&AppEvent::General(GeneralEvent::debug("noise")));
        assert_eq!(meta.level, EventLevel::Debug);
        assert!(meta.correlation_id.is_none());
    }
}
