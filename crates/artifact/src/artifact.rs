//! Install artifacts, the payload of every graph node

use mdk_errors::Error;
use mdk_graph::GraphNode;
use mdk_manifest::{ArtifactDescriptor, LibraryDefinition, Manifest, PlanDescriptor};
use mdk_types::{ArtifactIdentity, ArtifactState, ArtifactType, Properties};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A node of an install graph
pub type ArtifactNode = GraphNode<InstallArtifact>;

/// Handle to the staged copy of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    source: PathBuf,
    path: PathBuf,
}

impl StagedArtifact {
    pub fn new(source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
        }
    }

    /// Location the artifact was staged from
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Location of the staged descriptor
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the staged descriptor
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ArtifactDescriptor::read`].
    pub fn read_descriptor(&self) -> Result<ArtifactDescriptor, Error> {
        ArtifactDescriptor::read(&self.path)
    }
}

/// Type-specific data of an install artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Module { manifest: Manifest },
    Plan { descriptor: PlanDescriptor },
    Configuration { properties: Properties },
    Library { definition: LibraryDefinition },
}

impl ArtifactKind {
    /// Build the kind data for a validated descriptor
    #[must_use]
    pub fn from_descriptor(descriptor: &ArtifactDescriptor) -> Self {
        match descriptor.artifact_type {
            ArtifactType::Module => Self::Module {
                manifest: descriptor.module_manifest(),
            },
            ArtifactType::Plan => Self::Plan {
                descriptor: descriptor.plan.clone().unwrap_or_default(),
            },
            ArtifactType::Configuration => Self::Configuration {
                properties: descriptor.properties.clone(),
            },
            ArtifactType::Library => Self::Library {
                definition: descriptor.library.clone().unwrap_or_default(),
            },
        }
    }

    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::Module { .. } => ArtifactType::Module,
            Self::Plan { .. } => ArtifactType::Plan,
            Self::Configuration { .. } => ArtifactType::Configuration,
            Self::Library { .. } => ArtifactType::Library,
        }
    }
}

/// A deployable unit tracked through its lifecycle
///
/// All fields are behind locks: the pipeline rewrites manifests and scopes
/// while listeners on other threads read them. Lifecycle transitions of one
/// artifact are serialized by a separate transition lock.
pub struct InstallArtifact {
    identity: RwLock<ArtifactIdentity>,
    properties: RwLock<Properties>,
    kind: RwLock<ArtifactKind>,
    staged: StagedArtifact,
    state: RwLock<StateCell>,
    transition: Mutex<()>,
}

/// Current state and the one it replaced
#[derive(Debug, Clone, Copy)]
struct StateCell {
    current: ArtifactState,
    previous: ArtifactState,
}

impl StateCell {
    fn set(&mut self, state: ArtifactState) -> ArtifactState {
        let from = self.current;
        if from != state {
            self.previous = from;
            self.current = state;
        }
        from
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InstallArtifact {
    pub fn new(
        identity: ArtifactIdentity,
        kind: ArtifactKind,
        staged: StagedArtifact,
        properties: Properties,
    ) -> Self {
        Self {
            identity: RwLock::new(identity),
            properties: RwLock::new(properties),
            kind: RwLock::new(kind),
            staged,
            state: RwLock::new(StateCell {
                current: ArtifactState::Initial,
                previous: ArtifactState::Initial,
            }),
            transition: Mutex::new(()),
        }
    }

    /// Create an artifact in its initial state from a staged descriptor
    #[must_use]
    pub fn from_descriptor(descriptor: &ArtifactDescriptor, staged: StagedArtifact) -> Self {
        let properties = match descriptor.artifact_type {
            // a configuration publishes its properties instead of carrying them
            ArtifactType::Configuration => Properties::new(),
            _ => descriptor.properties.clone(),
        };
        Self::new(
            descriptor.identity(),
            ArtifactKind::from_descriptor(descriptor),
            staged,
            properties,
        )
    }

    #[must_use]
    pub fn identity(&self) -> ArtifactIdentity {
        read(&self.identity).clone()
    }

    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        read(&self.identity).artifact_type()
    }

    #[must_use]
    pub fn name(&self) -> String {
        read(&self.identity).name().to_string()
    }

    /// Move the artifact into a scope, or out of any with `None`
    pub fn set_scope(&self, scope_name: Option<String>) {
        let mut identity = write(&self.identity);
        *identity = identity.scoped(scope_name);
    }

    #[must_use]
    pub fn properties(&self) -> Properties {
        read(&self.properties).clone()
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        read(&self.properties).get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        write(&self.properties).insert(key.into(), value.into());
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        read(&self.kind).clone()
    }

    /// Module manifest, `None` for other artifact types
    #[must_use]
    pub fn manifest(&self) -> Option<Manifest> {
        match &*read(&self.kind) {
            ArtifactKind::Module { manifest } => Some(manifest.clone()),
            _ => None,
        }
    }

    /// Replace the module manifest; returns false for non-modules
    pub fn set_manifest(&self, manifest: Manifest) -> bool {
        match &mut *write(&self.kind) {
            ArtifactKind::Module { manifest: current } => {
                *current = manifest;
                true
            }
            _ => false,
        }
    }

    /// Plan descriptor, `None` for other artifact types
    #[must_use]
    pub fn plan(&self) -> Option<PlanDescriptor> {
        match &*read(&self.kind) {
            ArtifactKind::Plan { descriptor } => Some(descriptor.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn staged(&self) -> &StagedArtifact {
        &self.staged
    }

    /// Re-read the module manifest from the staged copy
    ///
    /// # Errors
    ///
    /// A staged copy that cannot be read is reported as a deployment failure
    /// wrapping the I/O cause, after being logged.
    pub fn read_manifest(&self) -> Result<Manifest, Error> {
        let identity = self.identity();
        match self.staged.read_descriptor() {
            Ok(descriptor) => Ok(descriptor.module_manifest()),
            Err(err) => {
                tracing::warn!(
                    artifact = %identity,
                    path = %self.staged.path().display(),
                    error = %err,
                    "failed to read module manifest"
                );
                Err(err.into_deployment_failure(format!("cannot read manifest of {identity}")))
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> ArtifactState {
        read(&self.state).current
    }

    /// The state the artifact was in before its last change
    #[must_use]
    pub fn previous_state(&self) -> ArtifactState {
        read(&self.state).previous
    }

    /// Set the state, returning the previous one
    pub(crate) fn replace_state(&self, state: ArtifactState) -> ArtifactState {
        write(&self.state).set(state)
    }

    /// Set the state only if it currently is `expected`
    pub(crate) fn set_state_if(&self, expected: ArtifactState, state: ArtifactState) -> bool {
        let mut cell = write(&self.state);
        if cell.current == expected {
            cell.set(state);
            true
        } else {
            false
        }
    }

    pub(crate) fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InstallArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallArtifact")
            .field("identity", &self.identity())
            .field("state", &self.state())
            .field("staged", &self.staged)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for InstallArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", read(&self.identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_types::Version;

    fn module() -> InstallArtifact {
        InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Module, "m", Version::new(1, 0, 0)),
            ArtifactKind::Module {
                manifest: Manifest::default(),
            },
            StagedArtifact::new("/src/m.toml", "/staging/m.toml"),
            Properties::new(),
        )
    }

    #[test]
    fn test_scope_correction_changes_identity() {
        let artifact = module();
        artifact.set_scope(Some("shop".into()));
        assert_eq!(artifact.identity().scope_name(), Some("shop"));
        artifact.set_scope(None);
        assert_eq!(artifact.identity().scope_name(), None);
    }

    #[test]
    fn test_previous_state_survives_repeated_state() {
        let artifact = module();
        artifact.replace_state(ArtifactState::Installed);
        artifact.replace_state(ArtifactState::Resolved);
        artifact.replace_state(ArtifactState::Resolved);
        assert_eq!(artifact.previous_state(), ArtifactState::Installed);

        assert!(!artifact.set_state_if(ArtifactState::Stopped, ArtifactState::Uninstalling));
        assert!(artifact.set_state_if(ArtifactState::Resolved, ArtifactState::Uninstalling));
        assert_eq!(artifact.previous_state(), ArtifactState::Resolved);
    }

    #[test]
    fn test_manifest_only_on_modules() {
        let artifact = module();
        assert!(artifact.manifest().is_some());
        assert!(artifact.plan().is_none());

        let config = InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Configuration, "c", Version::new(1, 0, 0)),
            ArtifactKind::Configuration {
                properties: Properties::new(),
            },
            StagedArtifact::new("/src/c.toml", "/staging/c.toml"),
            Properties::new(),
        );
        assert!(!config.set_manifest(Manifest::default()));
    }

    #[test]
    fn test_unreadable_staged_manifest_is_wrapped_io() {
        let err = module().read_manifest().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::Io {
                kind: std::io::ErrorKind::NotFound,
                ..
            }
        ));
        assert!(matches!(
            err,
            Error::Deployment(mdk_errors::DeploymentError::Wrapped { .. })
        ));
    }
}
