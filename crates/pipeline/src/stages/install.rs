use mdk_artifact::{post_order, ArtifactNode};
use mdk_errors::Error;
use mdk_types::ArtifactState;

use crate::{InstallEnvironment, PipelineStage};

/// Installs the tree, children first
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallStage;

impl PipelineStage for InstallStage {
    fn name(&self) -> &str {
        "install"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        env.lifecycle().install(tree)
    }
}

/// Uninstalls the tree and forgets its modules in the resolver state
///
/// Used as compensation after a failed install or resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallStage;

impl PipelineStage for UninstallStage {
    fn name(&self) -> &str {
        "uninstall"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        let result = env.lifecycle().uninstall(tree);

        let mut state = env.resolver_state_mut();
        for node in post_order(tree) {
            let artifact = node.value();
            if matches!(
                artifact.state(),
                ArtifactState::Initial | ArtifactState::Uninstalled
            ) && state.remove(&artifact.identity()).is_some()
            {
                tracing::debug!(artifact = %artifact, "module removed from resolver state");
            }
        }
        result
    }
}
