//! Per-artifact state changes and listener delivery

use mdk_errors::{Error, LifecycleError};
use mdk_types::ArtifactState;

use crate::listener::{InstallArtifactLifecycleListener, ListenerRegistry};
use crate::InstallArtifact;

/// Applies state changes to artifacts and notifies listeners
///
/// A notification is delivered only when the state actually changes, so a
/// signal that arrives twice produces one callback. Failure notifications
/// move the artifact back to the state it had before the failed operation.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStateMonitor {
    registry: ListenerRegistry,
}

impl ArtifactStateMonitor {
    #[must_use]
    pub fn new(registry: ListenerRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    fn enter(artifact: &InstallArtifact, to: ArtifactState) -> bool {
        let from = artifact.replace_state(to);
        if from == to {
            return false;
        }
        tracing::debug!(artifact = %artifact, %from, %to, "artifact state changed");
        true
    }

    fn leave(artifact: &InstallArtifact, from: ArtifactState, to: ArtifactState) -> bool {
        let changed = artifact.set_state_if(from, to);
        if changed {
            tracing::debug!(artifact = %artifact, %from, %to, "artifact state rolled back");
        }
        changed
    }

    fn notify(
        &self,
        artifact: &InstallArtifact,
        event: &str,
        call: impl Fn(&dyn InstallArtifactLifecycleListener) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for listener in self.registry.snapshot().iter() {
            call(listener.as_ref()).map_err(|err| -> Error {
                tracing::warn!(artifact = %artifact, event, error = %err, "listener failed");
                LifecycleError::ListenerFailed {
                    artifact: artifact.to_string(),
                    event: event.to_string(),
                    message: err.to_string(),
                }
                .into()
            })?;
        }
        Ok(())
    }

    fn notify_all(&self, call: impl Fn(&dyn InstallArtifactLifecycleListener)) {
        for listener in self.registry.snapshot().iter() {
            call(listener.as_ref());
        }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the install.
    pub fn on_installing(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if Self::enter(artifact, ArtifactState::Installing) {
            self.notify(artifact, "installing", |l| l.on_installing(artifact))?;
        }
        Ok(())
    }

    pub fn on_installed(&self, artifact: &InstallArtifact) {
        if Self::enter(artifact, ArtifactState::Installed) {
            self.notify_all(|l| l.on_installed(artifact));
        }
    }

    pub fn on_install_failed(&self, artifact: &InstallArtifact, error: &Error) {
        if Self::leave(artifact, ArtifactState::Installing, ArtifactState::Initial) {
            self.notify_all(|l| l.on_install_failed(artifact, error));
        }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the resolve.
    pub fn on_resolving(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if Self::enter(artifact, ArtifactState::Resolving) {
            self.notify(artifact, "resolving", |l| l.on_resolving(artifact))?;
        }
        Ok(())
    }

    pub fn on_resolved(&self, artifact: &InstallArtifact) {
        if Self::enter(artifact, ArtifactState::Resolved) {
            self.notify_all(|l| l.on_resolved(artifact));
        }
    }

    pub fn on_resolve_failed(&self, artifact: &InstallArtifact, error: &Error) {
        if Self::leave(artifact, ArtifactState::Resolving, ArtifactState::Installed) {
            self.notify_all(|l| l.on_resolve_failed(artifact, error));
        }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the start.
    pub fn on_starting(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if Self::enter(artifact, ArtifactState::Starting) {
            self.notify(artifact, "starting", |l| l.on_starting(artifact))?;
        }
        Ok(())
    }

    /// Complete a start; only an artifact that is still starting moves on
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::StartAborted` if the start was aborted
    /// before it completed, or `LifecycleError::ListenerFailed` if a
    /// listener fails; the artifact is then left started and the caller is
    /// expected to stop it.
    pub fn on_started(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if artifact.set_state_if(ArtifactState::Starting, ArtifactState::Started) {
            tracing::debug!(artifact = %artifact, "artifact state changed to started");
            return self.notify(artifact, "started", |l| l.on_started(artifact));
        }
        match artifact.state() {
            ArtifactState::Started => Ok(()),
            _ => Err(LifecycleError::StartAborted {
                artifact: artifact.to_string(),
            }
            .into()),
        }
    }

    pub fn on_start_failed(&self, artifact: &InstallArtifact, error: &Error) {
        if Self::leave(artifact, ArtifactState::Starting, ArtifactState::Resolved) {
            self.notify_all(|l| l.on_start_failed(artifact, error));
        }
    }

    pub fn on_start_aborted(&self, artifact: &InstallArtifact) {
        if Self::leave(artifact, ArtifactState::Starting, ArtifactState::Resolved) {
            self.notify_all(|l| l.on_start_aborted(artifact));
        }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the stop.
    pub fn on_stopping(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if Self::enter(artifact, ArtifactState::Stopping) {
            self.notify(artifact, "stopping", |l| l.on_stopping(artifact))?;
        }
        Ok(())
    }

    pub fn on_stopped(&self, artifact: &InstallArtifact) {
        if Self::enter(artifact, ArtifactState::Stopped) {
            self.notify_all(|l| l.on_stopped(artifact));
        }
    }

    pub fn on_stop_failed(&self, artifact: &InstallArtifact, error: &Error) {
        if Self::leave(artifact, ArtifactState::Stopping, ArtifactState::Started) {
            self.notify_all(|l| l.on_stop_failed(artifact, error));
        }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the uninstall.
    pub fn on_uninstalling(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        if Self::enter(artifact, ArtifactState::Uninstalling) {
            self.notify(artifact, "uninstalling", |l| l.on_uninstalling(artifact))?;
        }
        Ok(())
    }

    pub fn on_uninstalled(&self, artifact: &InstallArtifact) {
        if Self::enter(artifact, ArtifactState::Uninstalled) {
            self.notify_all(|l| l.on_uninstalled(artifact));
        }
    }

    pub fn on_uninstall_failed(&self, artifact: &InstallArtifact, error: &Error) {
        self.uninstall_failed(artifact, error, ArtifactState::Installed);
    }

    pub(crate) fn uninstall_failed(
        &self,
        artifact: &InstallArtifact,
        error: &Error,
        restore: ArtifactState,
    ) {
        if Self::leave(artifact, ArtifactState::Uninstalling, restore) {
            self.notify_all(|l| l.on_uninstall_failed(artifact, error));
        }
    }

    pub fn on_unresolved(&self, artifact: &InstallArtifact) {
        if Self::enter(artifact, ArtifactState::Unresolved) {
            self.notify_all(|l| l.on_unresolved(artifact));
        }
    }
}
