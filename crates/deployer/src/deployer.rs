//! The deployer façade

use mdk_artifact::{
    post_order, ArtifactLifecycle, ArtifactNode, ArtifactStateMonitor, EventEmittingListener,
    InMemoryModuleRuntime, ListenerRegistry, ModuleRuntime,
};
use dashmap::DashMap;
use mdk_config::{constants::DEFAULT_DEPLOYER_TIMEOUT_SECS, Config};
use mdk_errors::{DeploymentError, Error};
use mdk_events::{AppEvent, DeploymentEvent, EventEmitter, EventSender, FailureContext};
use mdk_pipeline::{install_pipeline, refresh_pipeline, InstallEnvironment, Pipeline, PipelineStage, UninstallStage};
use mdk_resolver::{expand_manifests, LibraryImportExpander, ModuleDescription, StateResolver};
use mdk_types::{ArtifactIdentity, ArtifactState, DeploymentIdentity, DeploymentOptions, Properties};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    ArtifactRepository, ArtifactStorage, ArtifactUri, DirectoryRepository, DirectoryStorage,
    InMemoryRepository, RepositoryLibraries, RuntimeArtifactModel, TreeBuilder,
};

/// Root property recording whether the deployer owns the staged copies
const OWNED_PROPERTY: &str = "deployment.owned";
const RECOVERABLE_PROPERTY: &str = "deployment.recoverable";

/// Assembles a [`PipelinedApplicationDeployer`]
pub struct DeployerBuilder {
    timeout: Duration,
    repository: Option<Arc<dyn ArtifactRepository>>,
    storage: Option<Arc<dyn ArtifactStorage>>,
    runtime: Option<Arc<dyn ModuleRuntime>>,
    registry: ListenerRegistry,
    event_sender: Option<EventSender>,
}

impl Default for DeployerBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_DEPLOYER_TIMEOUT_SECS),
            repository: None,
            storage: None,
            runtime: None,
            registry: ListenerRegistry::new(),
            event_sender: None,
        }
    }
}

impl DeployerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from configuration: timeout, repository and staging directory
    ///
    /// # Errors
    ///
    /// Returns an error if the repository directory cannot be scanned.
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let repository = DirectoryRepository::scan(config.repository_path()).await?;
        Ok(Self::new()
            .with_timeout(config.deployer_timeout())
            .with_repository(Arc::new(repository))
            .with_storage(Arc::new(DirectoryStorage::new(config.staging_path()))))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn ArtifactRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn ArtifactStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn ModuleRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Listeners registered here are notified of every lifecycle change
    #[must_use]
    pub fn with_listener_registry(mut self, registry: ListenerRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn build(self) -> PipelinedApplicationDeployer {
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryRepository::new()));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(DirectoryStorage::new(Config::default().staging_path())));
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(InMemoryModuleRuntime::new()));

        if let Some(sender) = &self.event_sender {
            self.registry
                .register(Arc::new(EventEmittingListener::new(sender.clone())));
        }
        let lifecycle = ArtifactLifecycle::new(ArtifactStateMonitor::new(self.registry), runtime);
        let expander = LibraryImportExpander::new(Arc::new(RepositoryLibraries::new(
            Arc::clone(&repository),
        )));
        let mut env = InstallEnvironment::new(lifecycle, Arc::new(expander));
        if let Some(sender) = &self.event_sender {
            env = env.with_event_sender(sender.clone());
        }

        let model = Arc::new(RuntimeArtifactModel::new());
        PipelinedApplicationDeployer {
            inner: Arc::new(Inner {
                timeout: self.timeout,
                builder: TreeBuilder::new(repository, Arc::clone(&storage))
                    .with_deployed(Arc::clone(&model)),
                storage,
                model,
                uri_locks: DashMap::new(),
                env,
                install: install_pipeline(),
                refresh: refresh_pipeline(),
                resolver: StateResolver::new(),
                event_sender: self.event_sender,
            }),
        }
    }
}

/// Deploys applications through the install pipeline
///
/// Operations on one URI run one at a time, each as its own task bounded
/// by the configured timeout. Work on the artifact tree runs on the
/// blocking pool; an operation that times out is reported failed but is not
/// interrupted, and a deployment is recorded if it later completes.
#[derive(Clone)]
pub struct PipelinedApplicationDeployer {
    inner: Arc<Inner>,
}

struct Inner {
    timeout: Duration,
    builder: TreeBuilder,
    storage: Arc<dyn ArtifactStorage>,
    model: Arc<RuntimeArtifactModel>,
    uri_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    env: InstallEnvironment,
    install: Pipeline,
    refresh: Pipeline,
    resolver: StateResolver,
    event_sender: Option<EventSender>,
}

impl EventEmitter for Inner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl std::fmt::Debug for PipelinedApplicationDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelinedApplicationDeployer")
            .field("timeout", &self.inner.timeout)
            .field("deployments", &self.inner.model.len())
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn blocking<T: Send + 'static>(
    work: impl FnOnce() -> Result<T, Error> + Send + 'static,
) -> Result<T, Error> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::internal(format!("deployment task failed: {e}")))?
}

impl PipelinedApplicationDeployer {
    #[must_use]
    pub fn builder() -> DeployerBuilder {
        DeployerBuilder::new()
    }

    /// The environment shared by every deployment's pipeline
    #[must_use]
    pub fn environment(&self) -> &InstallEnvironment {
        &self.inner.env
    }

    /// Run `work` once earlier operations on `key` have finished
    async fn serialized<T: Send + 'static>(
        &self,
        key: &str,
        work: impl Future<Output = Result<T, Error>> + Send + 'static,
    ) -> Result<T, Error> {
        let lock = self.inner.uri_lock(key);
        let task = tokio::spawn(async move {
            let _guard = lock.lock_owned().await;
            work.await
        });
        self.bounded(key, async move {
            task.await
                .map_err(|e| Error::internal(format!("deployment task failed: {e}")))?
        })
        .await
    }

    async fn bounded<T>(
        &self,
        uri: &str,
        work: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        if let Ok(result) = tokio::time::timeout(self.inner.timeout, work).await {
            result
        } else {
            let seconds = self.inner.timeout.as_secs();
            tracing::warn!(uri, seconds, "deployment operation timed out");
            self.inner.emit(AppEvent::Deployment(DeploymentEvent::TimedOut {
                uri: uri.to_string(),
                seconds,
            }));
            Err(DeploymentError::Timeout {
                uri: uri.to_string(),
                seconds,
            }
            .into())
        }
    }

    /// Deploy with default options
    ///
    /// # Errors
    ///
    /// See [`PipelinedApplicationDeployer::deploy_with_options`].
    pub async fn deploy(&self, uri: &str) -> Result<DeploymentIdentity, Error> {
        self.deploy_with_options(uri, DeploymentOptions::default())
            .await
    }

    /// Stage, build, install and resolve the artifact at `uri`, then start
    /// it unless `options.install_only` is set
    ///
    /// An artifact already deployed from `uri` is undeployed first.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::InvalidUri` if `uri` cannot be normalized,
    /// `DeploymentError::Timeout` if the deployment exceeds the timeout, or
    /// the failure of staging, tree construction, the pipeline or start.
    pub async fn deploy_with_options(
        &self,
        uri: &str,
        options: DeploymentOptions,
    ) -> Result<DeploymentIdentity, Error> {
        let uri = ArtifactUri::parse(uri)?;
        let key = uri.to_string();
        tracing::info!(uri = %key, install_only = options.install_only, "deploying");
        self.inner.emit(AppEvent::Deployment(DeploymentEvent::Started {
            uri: key.clone(),
            install_only: options.install_only,
        }));
        let started = Instant::now();

        let result = self
            .serialized(&key, Arc::clone(&self.inner).deploy(uri, options))
            .await;

        match &result {
            Ok(identity) => {
                tracing::info!(uri = %key, %identity, "deployed");
                self.inner.emit(AppEvent::Deployment(DeploymentEvent::Completed {
                    uri: key,
                    identity: identity.clone(),
                    duration_ms: elapsed_ms(started),
                }));
            }
            Err(err) => {
                tracing::warn!(uri = %key, error = %err, "deployment failed");
                self.inner.emit(AppEvent::Deployment(DeploymentEvent::Failed {
                    uri: key,
                    failure: FailureContext::from_error(err),
                }));
            }
        }
        result
    }

    /// Stop and uninstall the artifact deployed from `uri`
    ///
    /// Modules that were wired to it and no longer resolve become
    /// unresolved.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::NotDeployed` if nothing is deployed from
    /// `uri`, or the failure of stop or uninstall.
    pub async fn undeploy(&self, uri: &str) -> Result<(), Error> {
        let key = ArtifactUri::parse(uri)?.to_string();
        let inner = Arc::clone(&self.inner);
        self.serialized(&key, inner.undeploy(key.clone())).await
    }

    /// Whether an artifact is deployed from `uri`; never fails
    #[must_use]
    pub fn is_deployed(&self, uri: &str) -> bool {
        ArtifactUri::parse(uri).is_ok_and(|uri| self.inner.model.contains(&uri.to_string()))
    }

    /// Re-read the artifact deployed from `uri` and refresh it
    ///
    /// The staged copy is updated from its source, the module is
    /// re-resolved and, if it was running, restarted. A module that no
    /// longer resolves is left unresolved, as are modules wired to it that
    /// no longer resolve.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::NotDeployed`, `DeploymentError::Failed` for
    /// an artifact that is not a module, or the failure of reading the new
    /// manifest or restarting the module.
    pub async fn update(&self, uri: &str) -> Result<DeploymentIdentity, Error> {
        let key = ArtifactUri::parse(uri)?.to_string();
        let inner = Arc::clone(&self.inner);
        self.serialized(&key, inner.update(key.clone())).await
    }

    /// Every deployment as `(uri, identity)`, sorted by URI
    #[must_use]
    pub fn deployed(&self) -> Vec<(String, DeploymentIdentity)> {
        self.inner.model.all()
    }

    /// Root of the tree deployed from `uri`
    #[must_use]
    pub fn artifact(&self, uri: &str) -> Option<ArtifactNode> {
        let uri = ArtifactUri::parse(uri).ok()?;
        self.inner.model.get(&uri.to_string())
    }
}

impl Inner {
    fn uri_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.uri_locks.entry(key.to_string()).or_default().value())
    }

    async fn deploy(
        self: Arc<Self>,
        uri: ArtifactUri,
        options: DeploymentOptions,
    ) -> Result<DeploymentIdentity, Error> {
        let key = uri.to_string();
        if self.model.contains(&key) {
            tracing::info!(uri = %key, "undeploying previous deployment");
            Arc::clone(&self).undeploy(key.clone()).await?;
        }

        let staged = self.storage.stage(uri.path()).await?;
        let mut properties = Properties::new();
        properties.insert(OWNED_PROPERTY.to_string(), options.deployer_owned.to_string());
        properties.insert(RECOVERABLE_PROPERTY.to_string(), options.recoverable.to_string());

        let tree = match self.builder.build(staged.clone(), properties).await {
            Ok(tree) => tree,
            Err(err) => {
                self.discard(&staged).await;
                return Err(err);
            }
        };
        let identity = DeploymentIdentity::from(&tree.value().identity());

        let inner = Arc::clone(&self);
        let installed = tree.clone();
        let result = blocking(move || inner.install_tree(key, &installed, options)).await;
        if let Err(err) = result {
            self.discard_tree(&tree).await;
            self.builder.release(&tree);
            return Err(err);
        }
        Ok(identity)
    }

    fn install_tree(
        &self,
        key: String,
        tree: &ArtifactNode,
        options: DeploymentOptions,
    ) -> Result<(), Error> {
        self.install.process(tree, &self.env)?;
        if !options.install_only {
            if let Err(err) = self.env.lifecycle().start(tree) {
                tracing::warn!(artifact = %tree.value(), error = %err, "start failed, uninstalling");
                if let Err(uninstall_err) = UninstallStage.process(tree, &self.env) {
                    tracing::warn!(artifact = %tree.value(), error = %uninstall_err, "uninstall after failed start failed");
                }
                return Err(err);
            }
        }
        self.model.insert(key, tree.clone());
        Ok(())
    }

    async fn undeploy(self: Arc<Self>, key: String) -> Result<(), Error> {
        let root = self
            .model
            .remove(&key)
            .ok_or_else(|| DeploymentError::NotDeployed { uri: key.clone() })?;
        let identity = DeploymentIdentity::from(&root.value().identity());

        let inner = Arc::clone(&self);
        let removed = root.clone();
        blocking(move || inner.uninstall_tree(&removed)).await?;

        if root.value().property(OWNED_PROPERTY).as_deref() != Some("false") {
            self.discard_tree(&root).await;
        }
        self.builder.release(&root);
        tracing::info!(uri = %key, %identity, "undeployed");
        self.emit(AppEvent::Deployment(DeploymentEvent::Undeployed { identity }));
        Ok(())
    }

    fn uninstall_tree(&self, root: &ArtifactNode) -> Result<(), Error> {
        let modules: Vec<ArtifactIdentity> = post_order(root)
            .iter()
            .filter(|n| n.value().manifest().is_some())
            .map(|n| n.value().identity())
            .collect();
        let dependents: Vec<ArtifactIdentity> = self
            .env
            .resolver_state()
            .dependents_of(&modules)
            .into_iter()
            .filter(|d| !modules.contains(d))
            .collect();

        self.env.lifecycle().stop(root)?;
        UninstallStage.process(root, &self.env)?;
        self.revalidate(&dependents);
        Ok(())
    }

    async fn update(self: Arc<Self>, key: String) -> Result<DeploymentIdentity, Error> {
        let root = self
            .model
            .get(&key)
            .ok_or_else(|| DeploymentError::NotDeployed { uri: key.clone() })?;
        if root.value().manifest().is_none() {
            return Err(DeploymentError::Failed {
                message: format!("{} is not a module and cannot be updated", root.value()),
            }
            .into());
        }
        self.storage.update(root.value().staged()).await?;

        let identity = DeploymentIdentity::from(&root.value().identity());
        let inner = Arc::clone(&self);
        let refreshed = root.clone();
        let success = blocking(move || inner.refresh_tree(&refreshed)).await?;

        tracing::info!(uri = %key, %identity, success, "updated");
        self.emit(AppEvent::Deployment(DeploymentEvent::Refreshed {
            identity: identity.clone(),
            success,
        }));
        self.emit(AppEvent::Deployment(DeploymentEvent::Updated {
            identity: identity.clone(),
        }));
        Ok(identity)
    }

    fn refresh_tree(&self, root: &ArtifactNode) -> Result<bool, Error> {
        let artifact = root.value();
        let identity = artifact.identity();
        let mut manifest = artifact.read_manifest()?;
        for change in manifest.normalize(identity.version())? {
            self.env.log().info(&identity, change);
        }
        expand_manifests(self.env.expander(), std::slice::from_mut(&mut manifest))?;
        artifact.set_manifest(manifest.clone());

        let dependents: Vec<ArtifactIdentity> = {
            let mut state = self.env.resolver_state_mut();
            let dependents = state
                .dependents_of(std::slice::from_ref(&identity))
                .into_iter()
                .filter(|d| *d != identity)
                .collect();
            state.insert(ModuleDescription::from_manifest(identity.clone(), &manifest));
            dependents
        };

        let resolves = self
            .env
            .lifecycle()
            .refresh(root, || self.refresh.process(root, &self.env))?;
        self.revalidate(&dependents);
        Ok(resolves)
    }

    /// Re-resolve `modules`; those that fail become unresolved
    fn revalidate(&self, modules: &[ArtifactIdentity]) {
        for module in modules {
            let resolves = {
                let mut state = self.env.resolver_state_mut();
                state.unresolve(module);
                match self.resolver.resolve(&state, std::slice::from_ref(module)) {
                    Ok(wirings) => {
                        state.apply(wirings);
                        true
                    }
                    Err(errors) => {
                        for error in &errors {
                            self.env.log().warn(module, error.to_string());
                        }
                        false
                    }
                }
            };
            if resolves {
                continue;
            }
            let Some(node) = self.model.find_node(module) else {
                continue;
            };
            if let Err(err) = self.env.lifecycle().unresolve(&node) {
                tracing::warn!(artifact = %module, error = %err, "failed to stop unresolved module");
            }
        }
    }

    async fn discard(&self, staged: &mdk_artifact::StagedArtifact) {
        if let Err(err) = self.storage.discard(staged).await {
            tracing::warn!(staged = %staged.path().display(), error = %err, "failed to discard staged copy");
        }
    }

    /// Discard the staged copies of the nodes no deployment uses any more
    async fn discard_tree(&self, root: &ArtifactNode) {
        for node in post_order(root) {
            if matches!(
                node.value().state(),
                ArtifactState::Initial | ArtifactState::Uninstalled
            ) {
                self.discard(node.value().staged()).await;
            }
        }
    }
}
