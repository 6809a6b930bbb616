//! Shared services available to every pipeline stage

use mdk_artifact::ArtifactLifecycle;
use mdk_events::{EventEmitter, EventSender};
use mdk_resolver::{ImportExpander, ResolverState};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::InstallLog;

/// What a stage may use besides the tree it processes
#[derive(Clone)]
pub struct InstallEnvironment {
    log: Arc<InstallLog>,
    lifecycle: ArtifactLifecycle,
    expander: Arc<dyn ImportExpander>,
    resolver_state: Arc<RwLock<ResolverState>>,
    event_sender: Option<EventSender>,
}

impl std::fmt::Debug for InstallEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallEnvironment")
            .field("log", &self.log)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl EventEmitter for InstallEnvironment {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl InstallEnvironment {
    /// Create an environment with an empty resolver state and no events
    pub fn new(lifecycle: ArtifactLifecycle, expander: Arc<dyn ImportExpander>) -> Self {
        Self {
            log: Arc::new(InstallLog::default()),
            lifecycle,
            expander,
            resolver_state: Arc::new(RwLock::new(ResolverState::new())),
            event_sender: None,
        }
    }

    /// Share an existing resolver state, typically the deployer's
    #[must_use]
    pub fn with_resolver_state(mut self, state: Arc<RwLock<ResolverState>>) -> Self {
        self.resolver_state = state;
        self
    }

    /// Set the event sender; the install log emits through it too
    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.log = Arc::new(InstallLog::new(Some(sender.clone())));
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn log(&self) -> &InstallLog {
        &self.log
    }

    #[must_use]
    pub fn lifecycle(&self) -> &ArtifactLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn expander(&self) -> &dyn ImportExpander {
        self.expander.as_ref()
    }

    #[must_use]
    pub fn resolver_state_handle(&self) -> &Arc<RwLock<ResolverState>> {
        &self.resolver_state
    }

    pub fn resolver_state(&self) -> RwLockReadGuard<'_, ResolverState> {
        self.resolver_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn resolver_state_mut(&self) -> RwLockWriteGuard<'_, ResolverState> {
        self.resolver_state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
