use mdk_artifact::{post_order, ArtifactNode};
use mdk_errors::{DeploymentError, Error};
use mdk_types::ArtifactIdentity;
use std::collections::BTreeMap;

use super::fresh_nodes;
use crate::{InstallEnvironment, PipelineStage};

/// Places the members of scoped plans in the plan's scope
///
/// The scope is named `<plan>-<version>`. A scoped plan nested in another
/// one joins the outer scope. Two members exporting the same package would
/// make the scope ambiguous and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanScoper;

impl PlanScoper {
    #[must_use]
    pub fn scope_name(plan: &ArtifactIdentity) -> String {
        format!("{}-{}", plan.name(), plan.version())
    }

    fn check_exports(scope: &str, members: &[ArtifactNode]) -> Result<(), Error> {
        let mut exporters: BTreeMap<String, ArtifactIdentity> = BTreeMap::new();
        for member in members {
            let Some(manifest) = member.value().manifest() else {
                continue;
            };
            let identity = member.value().identity();
            for export in manifest.exports {
                match exporters.get(&export.name) {
                    Some(first) if *first != identity => {
                        return Err(DeploymentError::ScopeConflict {
                            scope: scope.to_string(),
                            package: export.name,
                            first: first.to_string(),
                            second: identity.to_string(),
                        }
                        .into());
                    }
                    Some(_) => {}
                    None => {
                        exporters.insert(export.name, identity.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

impl PipelineStage for PlanScoper {
    fn name(&self) -> &str {
        "plan-scoper"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        // parents before children so an outer scope claims nested members
        for node in fresh_nodes(tree).into_iter().rev() {
            let artifact = node.value();
            let Some(plan) = artifact.plan() else {
                continue;
            };
            if !plan.scoped {
                continue;
            }
            if let Some(outer) = artifact.identity().scope_name() {
                env.log()
                    .warn(artifact, format!("nested scoped plan joins scope '{outer}'"));
                continue;
            }

            let scope = Self::scope_name(&artifact.identity());
            let members: Vec<ArtifactNode> = post_order(&node)
                .into_iter()
                .filter(|member| member != &node)
                .collect();
            Self::check_exports(&scope, &members)?;

            for member in &members {
                member.value().set_scope(Some(scope.clone()));
            }
            env.log().info(
                artifact,
                format!("{} members placed in scope '{scope}'", members.len()),
            );
        }
        Ok(())
    }
}
