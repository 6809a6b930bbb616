use mdk_artifact::ArtifactNode;
use mdk_errors::Error;
use mdk_events::{AppEvent, EventEmitter, ResolverEvent};
use mdk_manifest::Manifest;
use mdk_resolver::expand_manifests;
use std::collections::BTreeMap;

use super::fresh_nodes;
use crate::{InstallEnvironment, PipelineStage};

/// Replaces library imports with the package imports they stand for
///
/// The modules of one scope are expanded together so their imports agree;
/// unscoped modules are expanded one at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportExpansionStage;

impl ImportExpansionStage {
    fn expand_unit(
        label: &str,
        members: &[ArtifactNode],
        env: &InstallEnvironment,
    ) -> Result<(), Error> {
        let mut manifests: Vec<Manifest> = members
            .iter()
            .filter_map(|m| m.value().manifest())
            .collect();
        let libraries: usize = manifests.iter().map(|m| m.library_imports.len()).sum();
        let before: usize = manifests.iter().map(|m| m.imports.len()).sum();

        let packages = match expand_manifests(env.expander(), &mut manifests) {
            Ok(packages) => packages,
            Err(err) => {
                env.log().warn(label, format!("import expansion failed: {err}"));
                return Err(err);
            }
        };

        for (member, manifest) in members.iter().zip(manifests) {
            member.value().set_manifest(manifest);
        }
        if libraries > 0 || packages != before {
            env.log().info(
                label,
                format!("{libraries} library imports expanded to {packages} package imports"),
            );
        }
        env.emit(AppEvent::Resolver(ResolverEvent::ImportsExpanded {
            artifact: label.to_string(),
            libraries,
            packages,
        }));
        Ok(())
    }
}

impl PipelineStage for ImportExpansionStage {
    fn name(&self) -> &str {
        "import-expansion"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        let mut scopes: BTreeMap<String, Vec<ArtifactNode>> = BTreeMap::new();
        for node in fresh_nodes(tree) {
            let artifact = node.value();
            if artifact.manifest().is_none() {
                continue;
            }
            match artifact.identity().scope_name() {
                Some(scope) => scopes.entry(scope.to_string()).or_default().push(node.clone()),
                None => Self::expand_unit(&artifact.to_string(), std::slice::from_ref(&node), env)?,
            }
        }
        for (scope, members) in scopes {
            Self::expand_unit(&format!("scope '{scope}'"), &members, env)?;
        }
        Ok(())
    }
}
