//! Lifecycle operations over install graphs
//!
//! Every operation takes the artifact's transition lock first, so
//! concurrent requests for one artifact run one after the other. Locks are
//! always taken parent before child, which the acyclic graph turns into a
//! global order.

use mdk_errors::{Error, LifecycleError};
use mdk_types::ArtifactState;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::runtime::{ModuleRuntime, StartOutcome};
use crate::{ArtifactNode, ArtifactStateMonitor, InstallArtifact};

/// Nodes reachable from `root`, every child before all of its parents
#[must_use]
pub fn post_order(root: &ArtifactNode) -> Vec<ArtifactNode> {
    fn walk(node: &ArtifactNode, seen: &mut HashSet<ArtifactNode>, out: &mut Vec<ArtifactNode>) {
        if !seen.insert(node.clone()) {
            return;
        }
        for child in node.children() {
            walk(&child, seen, out);
        }
        out.push(node.clone());
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(root, &mut seen, &mut out);
    out
}

/// Drives install graphs through their lifecycle
#[derive(Clone)]
pub struct ArtifactLifecycle {
    monitor: ArtifactStateMonitor,
    runtime: Arc<dyn ModuleRuntime>,
    /// Serializes graph-wide resolves, which hold many transition locks
    resolving: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ArtifactLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLifecycle")
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

fn invalid(artifact: &InstallArtifact, operation: &str) -> Error {
    LifecycleError::InvalidTransition {
        artifact: artifact.to_string(),
        state: artifact.state().to_string(),
        operation: operation.to_string(),
    }
    .into()
}

fn is_atomic(artifact: &InstallArtifact) -> bool {
    artifact.plan().is_some_and(|plan| plan.atomic)
}

/// Whether a parent other than `parent` still needs `child` in one of `states`
fn needed_elsewhere(child: &ArtifactNode, parent: &ArtifactNode, states: &[ArtifactState]) -> bool {
    child
        .parents()
        .iter()
        .any(|p| p != parent && states.contains(&p.value().state()))
}

impl ArtifactLifecycle {
    pub fn new(monitor: ArtifactStateMonitor, runtime: Arc<dyn ModuleRuntime>) -> Self {
        Self {
            monitor,
            runtime,
            resolving: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn monitor(&self) -> &ArtifactStateMonitor {
        &self.monitor
    }

    #[must_use]
    pub fn runtime(&self) -> &Arc<dyn ModuleRuntime> {
        &self.runtime
    }

    /// Install `node`, completing the install of its children first
    ///
    /// Artifacts that are already installed are left alone, so a child
    /// shared by several parents is installed once.
    ///
    /// # Errors
    ///
    /// Returns the first listener, runtime or child failure. The artifact is
    /// rolled back to its initial state; children that installed stay
    /// installed.
    pub fn install(&self, node: &ArtifactNode) -> Result<(), Error> {
        let artifact = node.value();
        let _guard = artifact.lock_transition();
        match artifact.state() {
            ArtifactState::Initial | ArtifactState::Uninstalled => {}
            ArtifactState::Installing => return Err(invalid(artifact, "install")),
            _ => return Ok(()),
        }

        let result = self.monitor.on_installing(artifact).and_then(|()| {
            for child in node.children() {
                self.install(&child)?;
            }
            if let Some(manifest) = artifact.manifest() {
                self.runtime.install(&artifact.identity(), &manifest)?;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                self.monitor.on_installed(artifact);
                tracing::info!(artifact = %artifact, "artifact installed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(artifact = %artifact, error = %err, "install failed");
                self.monitor.on_install_failed(artifact, &err);
                Err(err)
            }
        }
    }

    /// Resolve every installed or unresolved artifact under `node` with one
    /// call of `resolve`
    ///
    /// All pending artifacts enter `Resolving`, children first, then move
    /// to `Resolved` if `resolve` succeeds and back to `Installed` if not.
    /// The transition locks of every artifact under `node` are held until
    /// the last notification, parents first; `resolve` must not start
    /// lifecycle operations on those artifacts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if an artifact under `node` is not
    /// installed yet, a listener failure, or the error of `resolve`.
    pub fn resolve_with(
        &self,
        node: &ArtifactNode,
        resolve: impl FnOnce() -> Result<(), Error>,
    ) -> Result<(), Error> {
        let _serial = self
            .resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let nodes = post_order(node);
        let _guards: Vec<_> = nodes
            .iter()
            .rev()
            .map(|n| n.value().lock_transition())
            .collect();

        if let Some(uninstalled) = nodes.iter().find(|n| {
            matches!(
                n.value().state(),
                ArtifactState::Initial | ArtifactState::Uninstalled
            )
        }) {
            return Err(invalid(uninstalled.value(), "resolve"));
        }

        let pending: Vec<&ArtifactNode> = nodes
            .iter()
            .filter(|n| {
                matches!(
                    n.value().state(),
                    ArtifactState::Installed | ArtifactState::Unresolved
                )
            })
            .collect();

        let mut result = Ok(());
        for pending_node in &pending {
            if let Err(err) = self.monitor.on_resolving(pending_node.value()) {
                result = Err(err);
                break;
            }
        }
        let result = result.and_then(|()| resolve());

        for pending_node in &pending {
            let artifact = pending_node.value();
            match &result {
                Ok(()) => self.monitor.on_resolved(artifact),
                Err(err) => self.monitor.on_resolve_failed(artifact, err),
            }
        }

        match &result {
            Ok(()) => tracing::debug!(root = %node.value(), resolved = pending.len(), "graph resolved"),
            Err(err) => tracing::warn!(root = %node.value(), error = %err, "resolve failed"),
        }
        result
    }

    /// Start `node`, starting its children first
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the artifact is resolved or
    /// stopped, `StartAborted` if the runtime aborts the start or signals a
    /// stop before it completes, or the first listener, runtime or child
    /// failure. When a child of an atomic plan fails, the children this call
    /// started are stopped again. When an `on_started` listener fails the
    /// artifact is stopped again.
    pub fn start(&self, node: &ArtifactNode) -> Result<(), Error> {
        let _guard = node.value().lock_transition();
        self.start_locked(node)
    }

    fn start_locked(&self, node: &ArtifactNode) -> Result<(), Error> {
        let artifact = node.value();
        match artifact.state() {
            ArtifactState::Started => return Ok(()),
            ArtifactState::Resolved | ArtifactState::Stopped => {}
            _ => return Err(invalid(artifact, "start")),
        }

        if let Err(err) = self.monitor.on_starting(artifact) {
            self.monitor.on_start_failed(artifact, &err);
            return Err(err);
        }

        let mut started = Vec::new();
        for child in node.children() {
            let was_started = child.value().state() == ArtifactState::Started;
            match self.start(&child) {
                Ok(()) if !was_started => started.push(child),
                Ok(()) => {}
                Err(err) => {
                    if is_atomic(artifact) {
                        self.stop_all(&started);
                    }
                    tracing::warn!(artifact = %artifact, child = %child.value(), error = %err, "child failed to start");
                    self.monitor.on_start_failed(artifact, &err);
                    return Err(err);
                }
            }
        }

        if artifact.manifest().is_some() {
            match self.runtime.start(&artifact.identity()) {
                Ok(StartOutcome::Started) => {}
                Ok(StartOutcome::Aborted) => {
                    tracing::info!(artifact = %artifact, "start aborted");
                    self.monitor.on_start_aborted(artifact);
                    return Err(LifecycleError::StartAborted {
                        artifact: artifact.to_string(),
                    }
                    .into());
                }
                Err(err) => {
                    tracing::warn!(artifact = %artifact, error = %err, "runtime failed to start module");
                    self.monitor.on_start_failed(artifact, &err);
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.monitor.on_started(artifact) {
            if artifact.state() != ArtifactState::Started {
                tracing::info!(artifact = %artifact, "start aborted while the module was starting");
                return Err(err);
            }
            tracing::warn!(artifact = %artifact, error = %err, "stopping artifact after failed start notification");
            if let Err(stop_err) = self.stop_locked(node) {
                tracing::warn!(artifact = %artifact, error = %stop_err, "compensating stop failed");
            }
            return Err(err);
        }

        tracing::info!(artifact = %artifact, "artifact started");
        Ok(())
    }

    fn stop_all(&self, nodes: &[ArtifactNode]) {
        for node in nodes.iter().rev() {
            if let Err(err) = self.stop(node) {
                tracing::warn!(artifact = %node.value(), error = %err, "failed to stop artifact");
            }
        }
    }

    /// Stop `node`, then the children no other started parent needs
    ///
    /// Artifacts that are not started are left alone.
    ///
    /// # Errors
    ///
    /// Returns a listener or runtime failure; the artifact stays started.
    /// Failures stopping children are logged.
    pub fn stop(&self, node: &ArtifactNode) -> Result<(), Error> {
        let _guard = node.value().lock_transition();
        self.stop_locked(node)
    }

    fn stop_locked(&self, node: &ArtifactNode) -> Result<(), Error> {
        let artifact = node.value();
        if artifact.state() != ArtifactState::Started {
            return Ok(());
        }

        let result = self.monitor.on_stopping(artifact).and_then(|()| {
            if artifact.manifest().is_some() {
                self.runtime.stop(&artifact.identity())?;
            }
            Ok(())
        });
        if let Err(err) = result {
            tracing::warn!(artifact = %artifact, error = %err, "stop failed");
            self.monitor.on_stop_failed(artifact, &err);
            return Err(err);
        }

        let active = [ArtifactState::Starting, ArtifactState::Started];
        let children: Vec<_> = node
            .children()
            .into_iter()
            .filter(|child| !needed_elsewhere(child, node, &active))
            .collect();
        self.stop_all(&children);

        self.monitor.on_stopped(artifact);
        tracing::info!(artifact = %artifact, "artifact stopped");
        Ok(())
    }

    /// Uninstall `node`, stopping it first, then the children no other
    /// installed parent needs
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for an artifact in the middle of another
    /// operation, or a listener or runtime failure.
    pub fn uninstall(&self, node: &ArtifactNode) -> Result<(), Error> {
        let artifact = node.value();
        let _guard = artifact.lock_transition();
        match artifact.state() {
            ArtifactState::Initial | ArtifactState::Uninstalled => return Ok(()),
            ArtifactState::Started => self.stop_locked(node)?,
            ArtifactState::Installed
            | ArtifactState::Resolved
            | ArtifactState::Stopped
            | ArtifactState::Unresolved => {}
            _ => return Err(invalid(artifact, "uninstall")),
        }

        let restore = artifact.state();
        let result = self.monitor.on_uninstalling(artifact).and_then(|()| {
            if artifact.manifest().is_some() {
                self.runtime.uninstall(&artifact.identity())?;
            }
            Ok(())
        });
        if let Err(err) = result {
            tracing::warn!(artifact = %artifact, error = %err, "uninstall failed");
            self.monitor.uninstall_failed(artifact, &err, restore);
            return Err(err);
        }

        let installed = [
            ArtifactState::Installed,
            ArtifactState::Resolved,
            ArtifactState::Starting,
            ArtifactState::Started,
            ArtifactState::Stopped,
            ArtifactState::Unresolved,
        ];
        for child in node.children() {
            if needed_elsewhere(&child, node, &installed) {
                continue;
            }
            if let Err(err) = self.uninstall(&child) {
                tracing::warn!(artifact = %child.value(), error = %err, "failed to uninstall child");
            }
        }

        self.monitor.on_uninstalled(artifact);
        tracing::info!(artifact = %artifact, "artifact uninstalled");
        Ok(())
    }

    /// Mark `node` unresolved after a dependency went away
    ///
    /// A started artifact is stopped first.
    ///
    /// # Errors
    ///
    /// Returns the failure of the stop.
    pub fn unresolve(&self, node: &ArtifactNode) -> Result<(), Error> {
        let artifact = node.value();
        let _guard = artifact.lock_transition();
        if artifact.state() == ArtifactState::Started {
            self.stop_locked(node)?;
        }
        if matches!(
            artifact.state(),
            ArtifactState::Resolved | ArtifactState::Stopped
        ) {
            self.monitor.on_unresolved(artifact);
            tracing::info!(artifact = %artifact, "artifact unresolved");
        }
        Ok(())
    }

    /// Re-resolve `node` after its content changed
    ///
    /// A started artifact is stopped, re-resolved with `resolve` and started
    /// again. Returns whether it still resolves; one that does not is left
    /// `Unresolved`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the artifact was resolved before,
    /// or a stop or restart failure.
    pub fn refresh(
        &self,
        node: &ArtifactNode,
        resolve: impl FnOnce() -> Result<(), Error>,
    ) -> Result<bool, Error> {
        let artifact = node.value();
        let _guard = artifact.lock_transition();
        let was_started = match artifact.state() {
            ArtifactState::Started => true,
            ArtifactState::Resolved | ArtifactState::Stopped | ArtifactState::Unresolved => false,
            _ => return Err(invalid(artifact, "refresh")),
        };
        tracing::info!(artifact = %artifact, "refreshing artifact");

        if was_started {
            self.stop_locked(node)?;
        }

        if let Err(err) = resolve() {
            tracing::warn!(artifact = %artifact, error = %err, "artifact no longer resolves");
            self.monitor.on_unresolved(artifact);
            return Ok(false);
        }

        if artifact.state() == ArtifactState::Unresolved {
            self.monitor.on_resolving(artifact)?;
            self.monitor.on_resolved(artifact);
        }
        if was_started {
            self.start_locked(node)?;
        }
        Ok(true)
    }
}
