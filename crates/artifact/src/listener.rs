//! Lifecycle listeners and their registry

use mdk_errors::Error;
use mdk_events::{AppEvent, EventEmitter, EventSender, FailureContext, LifecycleEvent};
use mdk_types::ArtifactState;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::InstallArtifact;

/// Observer of install artifact lifecycle transitions
///
/// Notifications are delivered synchronously on the thread driving the
/// transition, so a slow listener stalls the artifact it is notified about.
/// A listener registered part way through a lifecycle sees only later
/// notifications; it may receive `on_started` without `on_starting`.
///
/// An error from an "-ing" notification fails the operation. An error from
/// `on_started` stops the artifact again.
#[allow(unused_variables)]
pub trait InstallArtifactLifecycleListener: Send + Sync {
    fn on_installing(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_installed(&self, artifact: &InstallArtifact) {}

    fn on_install_failed(&self, artifact: &InstallArtifact, error: &Error) {}

    fn on_resolving(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_resolved(&self, artifact: &InstallArtifact) {}

    fn on_resolve_failed(&self, artifact: &InstallArtifact, error: &Error) {}

    fn on_starting(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_started(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_start_failed(&self, artifact: &InstallArtifact, error: &Error) {}

    fn on_start_aborted(&self, artifact: &InstallArtifact) {}

    fn on_stopping(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_stopped(&self, artifact: &InstallArtifact) {}

    fn on_stop_failed(&self, artifact: &InstallArtifact, error: &Error) {}

    fn on_uninstalling(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        Ok(())
    }

    fn on_uninstalled(&self, artifact: &InstallArtifact) {}

    fn on_uninstall_failed(&self, artifact: &InstallArtifact, error: &Error) {}

    fn on_unresolved(&self, artifact: &InstallArtifact) {}
}

type Listeners = Arc<Vec<Arc<dyn InstallArtifactLifecycleListener>>>;

/// Append-only set of lifecycle listeners
///
/// Registration replaces the shared list, so a notification in progress
/// keeps iterating the snapshot it started with.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<Listeners>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static ListenerRegistry {
        static GLOBAL: OnceLock<ListenerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ListenerRegistry::new)
    }

    pub fn register(&self, listener: Arc<dyn InstallArtifactLifecycleListener>) {
        let mut guard = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.push(listener);
        *guard = Arc::new(next);
    }

    #[must_use]
    pub fn snapshot(&self) -> Listeners {
        Arc::clone(&self.listeners.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Forwards lifecycle notifications to the event channel
///
/// Each notification is reported as a transition from the state the
/// artifact left, which the monitor records before notifying.
#[derive(Debug, Clone)]
pub struct EventEmittingListener {
    sender: EventSender,
}

impl EventEmittingListener {
    #[must_use]
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }

    fn transition(&self, artifact: &InstallArtifact, to: ArtifactState) {
        self.emit_transition(artifact.to_string(), artifact.previous_state(), to);
    }

    fn failed(&self, artifact: &InstallArtifact, operation: &str, error: &Error) {
        self.emit(AppEvent::Lifecycle(LifecycleEvent::OperationFailed {
            artifact: artifact.to_string(),
            operation: operation.to_string(),
            failure: FailureContext::from_error(error),
        }));
    }
}

impl EventEmitter for EventEmittingListener {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.sender)
    }
}

impl InstallArtifactLifecycleListener for EventEmittingListener {
    fn on_installing(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Installing);
        Ok(())
    }

    fn on_installed(&self, artifact: &InstallArtifact) {
        self.transition(artifact, ArtifactState::Installed);
    }

    fn on_install_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.failed(artifact, "install", error);
    }

    fn on_resolving(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Resolving);
        Ok(())
    }

    fn on_resolved(&self, artifact: &InstallArtifact) {
        self.transition(artifact, ArtifactState::Resolved);
    }

    fn on_resolve_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.failed(artifact, "resolve", error);
    }

    fn on_starting(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Starting);
        Ok(())
    }

    fn on_started(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Started);
        Ok(())
    }

    fn on_start_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.failed(artifact, "start", error);
    }

    fn on_start_aborted(&self, artifact: &InstallArtifact) {
        self.emit(AppEvent::Lifecycle(LifecycleEvent::StartAborted {
            artifact: artifact.to_string(),
        }));
    }

    fn on_stopping(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Stopping);
        Ok(())
    }

    fn on_stopped(&self, artifact: &InstallArtifact) {
        self.transition(artifact, ArtifactState::Stopped);
    }

    fn on_stop_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.failed(artifact, "stop", error);
    }

    fn on_uninstalling(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.transition(artifact, ArtifactState::Uninstalling);
        Ok(())
    }

    fn on_uninstalled(&self, artifact: &InstallArtifact) {
        self.transition(artifact, ArtifactState::Uninstalled);
    }

    fn on_uninstall_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.failed(artifact, "uninstall", error);
    }

    fn on_unresolved(&self, artifact: &InstallArtifact) {
        self.transition(artifact, ArtifactState::Unresolved);
    }
}
