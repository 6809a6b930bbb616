use mdk_artifact::ArtifactNode;
use mdk_errors::Error;

use super::fresh_nodes;
use crate::{InstallEnvironment, PipelineStage};

/// Normalizes module manifests before anything reads them
///
/// Exports without a version take the module's version, duplicate exports
/// are dropped and repeated imports of one package are merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestUpgrader;

impl PipelineStage for ManifestUpgrader {
    fn name(&self) -> &str {
        "manifest-upgrader"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        for node in fresh_nodes(tree) {
            let artifact = node.value();
            let Some(mut manifest) = artifact.manifest() else {
                continue;
            };
            let identity = artifact.identity();
            let changes = manifest.normalize(identity.version())?;
            if changes.is_empty() {
                continue;
            }
            for change in &changes {
                env.log().info(&identity, change.as_str());
            }
            artifact.set_manifest(manifest);
        }
        Ok(())
    }
}
