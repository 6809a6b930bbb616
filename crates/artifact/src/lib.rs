#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Install artifacts and their lifecycle for mdk
//!
//! An [`InstallArtifact`] is the value of every node in an install graph.
//! [`ArtifactLifecycle`] moves graphs through install, resolve, start, stop
//! and uninstall, reporting every state change to the registered
//! [`InstallArtifactLifecycleListener`]s through an
//! [`ArtifactStateMonitor`].

mod artifact;
mod lifecycle;
mod listener;
mod monitor;
mod runtime;

pub use artifact::{ArtifactKind, ArtifactNode, InstallArtifact, StagedArtifact};
pub use lifecycle::{post_order, ArtifactLifecycle};
pub use listener::{EventEmittingListener, InstallArtifactLifecycleListener, ListenerRegistry};
pub use monitor::ArtifactStateMonitor;
pub use runtime::{
    ArtifactRuntime, InMemoryModuleRuntime, ModuleRuntime, ModuleStatus, StartOutcome,
};
