#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Application deployment for mdk
//!
//! [`PipelinedApplicationDeployer`] is the entry point: it stages a
//! descriptor, builds the artifact tree from the repository, runs the
//! install pipeline and starts the result. Deployed trees are kept in a
//! [`RuntimeArtifactModel`] keyed by their normalized URI.

mod deployer;
mod model;
mod repository;
mod storage;
mod tree;
mod uri;

pub use deployer::{DeployerBuilder, PipelinedApplicationDeployer};
pub use model::RuntimeArtifactModel;
pub use repository::{
    ArtifactRepository, DirectoryRepository, InMemoryRepository, RepositoryEntry,
    RepositoryLibraries,
};
pub use storage::{ArtifactStorage, DirectoryStorage};
pub use tree::TreeBuilder;
pub use uri::ArtifactUri;
