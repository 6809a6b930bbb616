//! Module runtime seam and runtime-originated signals

use dashmap::DashMap;
use mdk_errors::{Error, LifecycleError};
use mdk_manifest::Manifest;
use mdk_types::{ArtifactIdentity, ArtifactState};

use crate::{ArtifactStateMonitor, InstallArtifact};

/// How a start request ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The module was stopped before activation completed
    Aborted,
}

/// The runtime that loads and runs modules
pub trait ModuleRuntime: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the module.
    fn install(&self, module: &ArtifactIdentity, manifest: &Manifest) -> Result<(), Error>;

    /// # Errors
    ///
    /// Returns an error if activation fails.
    fn start(&self, module: &ArtifactIdentity) -> Result<StartOutcome, Error>;

    /// # Errors
    ///
    /// Returns an error if deactivation fails.
    fn stop(&self, module: &ArtifactIdentity) -> Result<(), Error>;

    /// # Errors
    ///
    /// Returns an error if the module cannot be removed.
    fn uninstall(&self, module: &ArtifactIdentity) -> Result<(), Error>;
}

/// Status of a module held by [`InMemoryModuleRuntime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Installed,
    Active,
}

/// Runtime that tracks modules in memory without loading anything
#[derive(Debug, Default)]
pub struct InMemoryModuleRuntime {
    modules: DashMap<ArtifactIdentity, ModuleStatus>,
}

impl InMemoryModuleRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self, module: &ArtifactIdentity) -> Option<ModuleStatus> {
        self.modules.get(module).map(|entry| *entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn not_installed(module: &ArtifactIdentity, operation: &str) -> Error {
        LifecycleError::RuntimeFailed {
            artifact: module.to_string(),
            operation: operation.to_string(),
            message: "module is not installed in the runtime".to_string(),
        }
        .into()
    }
}

impl ModuleRuntime for InMemoryModuleRuntime {
    fn install(&self, module: &ArtifactIdentity, manifest: &Manifest) -> Result<(), Error> {
        tracing::debug!(
            module = %module,
            exports = manifest.exports.len(),
            imports = manifest.imports.len(),
            "module installed in runtime"
        );
        self.modules.insert(module.clone(), ModuleStatus::Installed);
        Ok(())
    }

    fn start(&self, module: &ArtifactIdentity) -> Result<StartOutcome, Error> {
        let mut entry = self
            .modules
            .get_mut(module)
            .ok_or_else(|| Self::not_installed(module, "start"))?;
        *entry = ModuleStatus::Active;
        Ok(StartOutcome::Started)
    }

    fn stop(&self, module: &ArtifactIdentity) -> Result<(), Error> {
        let mut entry = self
            .modules
            .get_mut(module)
            .ok_or_else(|| Self::not_installed(module, "stop"))?;
        *entry = ModuleStatus::Installed;
        Ok(())
    }

    fn uninstall(&self, module: &ArtifactIdentity) -> Result<(), Error> {
        self.modules
            .remove(module)
            .map(|_| ())
            .ok_or_else(|| Self::not_installed(module, "uninstall"))
    }
}

/// Entry point for notifications that originate in the module runtime
///
/// The runtime may report the same change more than once, or report a
/// change the kernel already applied; the state monitor drops repeats.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRuntime {
    monitor: ArtifactStateMonitor,
}

impl ArtifactRuntime {
    #[must_use]
    pub fn new(monitor: ArtifactStateMonitor) -> Self {
        Self { monitor }
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the start.
    pub fn signal_starting(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.monitor.on_starting(artifact)
    }

    /// # Errors
    ///
    /// Returns `LifecycleError::StartAborted` if the start was already
    /// aborted, or `LifecycleError::ListenerFailed` if a listener fails.
    pub fn signal_started(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        self.monitor.on_started(artifact)
    }

    /// A module stopped; aborts a start still in progress
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::ListenerFailed` if a listener rejects the stop.
    pub fn signal_stopped(&self, artifact: &InstallArtifact) -> Result<(), Error> {
        match artifact.state() {
            ArtifactState::Starting => {
                tracing::info!(artifact = %artifact, "start aborted by runtime");
                self.monitor.on_start_aborted(artifact);
                Ok(())
            }
            ArtifactState::Started | ArtifactState::Stopping => {
                self.monitor.on_stopping(artifact)?;
                self.monitor.on_stopped(artifact);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
