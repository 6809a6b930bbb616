//! Append-only log of what the pipeline did to a deployment

use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use mdk_events::{EventEmitter, EventSender};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// The artifact the entry is about
    pub artifact: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.artifact,
            self.message
        )
    }
}

/// Concurrent install log
///
/// Every entry is also written to `tracing` and, when a sender is set,
/// emitted as a general event.
#[derive(Debug, Default)]
pub struct InstallLog {
    entries: SegQueue<LogEntry>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for InstallLog {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl InstallLog {
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self {
            entries: SegQueue::new(),
            event_sender,
        }
    }

    pub fn info(&self, artifact: impl fmt::Display, message: impl Into<String>) {
        self.push(LogLevel::Info, artifact.to_string(), message.into());
    }

    pub fn warn(&self, artifact: impl fmt::Display, message: impl Into<String>) {
        self.push(LogLevel::Warning, artifact.to_string(), message.into());
    }

    fn push(&self, level: LogLevel, artifact: String, message: String) {
        match level {
            LogLevel::Info => {
                tracing::info!(artifact = %artifact, "{message}");
                self.emit_debug(format!("{artifact}: {message}"));
            }
            LogLevel::Warning => {
                tracing::warn!(artifact = %artifact, "{message}");
                self.emit_warning_with_context(message.clone(), artifact.clone());
            }
        }
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            artifact,
            message,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry recorded so far, oldest first
    pub fn drain(&self) -> Vec<LogEntry> {
        std::iter::from_fn(|| self.entries.pop()).collect()
    }
}
