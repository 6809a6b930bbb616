//! The stages of the install pipeline

mod expansion;
mod install;
mod module_type;
mod resolve;
mod scoping;
mod upgrade;

pub use expansion::ImportExpansionStage;
pub use install::{InstallStage, UninstallStage};
pub use module_type::{ModuleTypeDetector, MODULE_TYPE_PROPERTY};
pub use resolve::ResolveStage;
pub use scoping::PlanScoper;
pub use upgrade::ManifestUpgrader;

use mdk_artifact::{post_order, ArtifactNode};
use mdk_types::ArtifactState;

/// Nodes under `tree` this deployment has not installed yet, children first
fn fresh_nodes(tree: &ArtifactNode) -> Vec<ArtifactNode> {
    post_order(tree)
        .into_iter()
        .filter(|n| n.value().state() == ArtifactState::Initial)
        .collect()
}
