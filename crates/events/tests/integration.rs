//! Integration tests for events

#[cfg(test)]
mod tests {
    use mdk_errors::{DeploymentError, UserFacingError};
    use mdk_events::*;
    use mdk_types::ArtifactState;

    #[tokio::test]
    async fn test_event_emitter_helpers() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_transition_metadata() {
        let (tx, mut rx) = channel();
        tx.emit_transition("module 'a'", ArtifactState::Installing, ArtifactState::Installed);

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.source, EventSource::LIFECYCLE);
        assert_eq!(message.meta.correlation_id.as_deref(), Some("module 'a'"));
        assert_eq!(message.event.log_target(), "mdk::events::lifecycle");
        assert_eq!(message.event.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_failure_context_from_error() {
        let err = DeploymentError::Timeout {
            uri: "file:///srv/app.toml".into(),
            seconds: 5,
        };
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), err.user_code());
        assert_eq!(failure.retryable, err.is_retryable());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Deployment(DeploymentEvent::TimedOut {
            uri: "file:///srv/app.toml".into(),
            seconds: 3,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "deployment");
        assert_eq!(json["event"]["type"], "TimedOut");
    }

    #[test]
    fn test_optional_sender_without_channel() {
        let none: Option<EventSender> = None;
        none.emit_warning("dropped silently");
    }
}
