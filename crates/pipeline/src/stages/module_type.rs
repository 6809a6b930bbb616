use mdk_artifact::ArtifactNode;
use mdk_errors::Error;
use mdk_manifest::{MODULE_TYPE_HEADER, WEB_CONTEXT_PATH_HEADER};

use super::fresh_nodes;
use crate::{InstallEnvironment, PipelineStage};

/// Deployment property holding the detected module type
pub const MODULE_TYPE_PROPERTY: &str = "module.type";

/// Records what kind of module each module artifact is
///
/// An explicit `Module-Type` header wins, a web context path makes a `web`
/// module and anything else is `standard`. A type set in the deployment
/// properties is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleTypeDetector;

impl PipelineStage for ModuleTypeDetector {
    fn name(&self) -> &str {
        "module-type-detector"
    }

    fn process(&self, tree: &ArtifactNode, _env: &InstallEnvironment) -> Result<(), Error> {
        for node in fresh_nodes(tree) {
            let artifact = node.value();
            let Some(manifest) = artifact.manifest() else {
                continue;
            };
            if artifact.property(MODULE_TYPE_PROPERTY).is_some() {
                continue;
            }
            let module_type = match manifest.header(MODULE_TYPE_HEADER) {
                Some(explicit) => explicit.to_string(),
                None if manifest.header(WEB_CONTEXT_PATH_HEADER).is_some() => "web".to_string(),
                None => "standard".to_string(),
            };
            tracing::debug!(artifact = %artifact, %module_type, "module type detected");
            artifact.set_property(MODULE_TYPE_PROPERTY, module_type);
        }
        Ok(())
    }
}
