//! Builds the install tree of a deployment

use mdk_artifact::{post_order, ArtifactNode, InstallArtifact, StagedArtifact};
use mdk_errors::{DeploymentError, Error};
use mdk_graph::Dag;
use mdk_manifest::{ArtifactDescriptor, Provisioning};
use mdk_types::{ArtifactIdentity, ArtifactState, ArtifactType, Properties, VersionRange};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{ArtifactRepository, ArtifactStorage, RuntimeArtifactModel};

/// A node whose children still have to be added
struct Pending {
    node: ArtifactNode,
    descriptor: ArtifactDescriptor,
    provisioning: Provisioning,
    /// Inside a scoped plan, whose members are private to the scope
    scoped: bool,
}

/// Turns a staged descriptor into a tree of install artifacts
///
/// Plan members and libraries are fetched from the repository and staged.
/// Every tree lives in one graph. Within a tree an artifact appears once,
/// and an unscoped artifact that an earlier deployment already installed
/// is shared with it instead of being staged again.
#[derive(Clone)]
pub struct TreeBuilder {
    repository: Arc<dyn ArtifactRepository>,
    storage: Arc<dyn ArtifactStorage>,
    dag: Dag<InstallArtifact>,
    deployed: Arc<RuntimeArtifactModel>,
}

impl TreeBuilder {
    pub fn new(repository: Arc<dyn ArtifactRepository>, storage: Arc<dyn ArtifactStorage>) -> Self {
        Self {
            repository,
            storage,
            dag: Dag::new(),
            deployed: Arc::new(RuntimeArtifactModel::new()),
        }
    }

    /// Share nodes with the trees recorded in `deployed`
    #[must_use]
    pub fn with_deployed(mut self, deployed: Arc<RuntimeArtifactModel>) -> Self {
        self.deployed = deployed;
        self
    }

    #[must_use]
    pub fn dag(&self) -> &Dag<InstallArtifact> {
        &self.dag
    }

    /// An installed node of another deployment with `identity`
    fn deployed_node(&self, identity: &ArtifactIdentity) -> Option<ArtifactNode> {
        self.deployed.find_node(identity).filter(|node| {
            !matches!(
                node.value().state(),
                ArtifactState::Initial | ArtifactState::Uninstalled
            )
        })
    }

    /// Drop a tree that is no longer deployed from the graph
    ///
    /// Nodes another deployment still refers to stay.
    pub fn release(&self, root: &ArtifactNode) {
        let mut pending = vec![root.clone()];
        while let Some(node) = pending.pop() {
            if !node.is_root_node() || self.deployed.contains_root(&node) {
                continue;
            }
            let children = node.children();
            if self.dag.delete(&node) {
                pending.extend(children);
            }
        }
        tracing::debug!(root = %root.value(), nodes = self.dag.node_count(), "tree released");
    }

    /// # Errors
    ///
    /// Returns the error of reading or staging a descriptor,
    /// `DeploymentError::ArtifactNotFound` for a plan member missing from
    /// the repository, or a graph error. The partial tree is released and
    /// the copies staged for it are discarded; the root's copy is left to
    /// the caller.
    pub async fn build(
        &self,
        staged: StagedArtifact,
        properties: Properties,
    ) -> Result<ArtifactNode, Error> {
        let descriptor = ArtifactDescriptor::from_file(staged.path()).await?;
        let root = self
            .dag
            .create_root_node(InstallArtifact::from_descriptor(&descriptor, staged));
        for (key, value) in properties {
            root.value().set_property(key, value);
        }

        if let Err(err) = self.populate(&root, descriptor).await {
            for node in post_order(&root) {
                if node != root && node.value().state() == ArtifactState::Initial {
                    if let Err(discard_err) = self.storage.discard(node.value().staged()).await {
                        tracing::warn!(artifact = %node.value(), error = %discard_err, "failed to discard staged copy");
                    }
                }
            }
            self.release(&root);
            return Err(err);
        }

        tracing::debug!(root = %root.value(), size = root.size(), "install tree built");
        Ok(root)
    }

    async fn populate(&self, root: &ArtifactNode, descriptor: ArtifactDescriptor) -> Result<(), Error> {
        let mut nodes: HashMap<ArtifactIdentity, ArtifactNode> = HashMap::new();
        nodes.insert(descriptor.identity(), root.clone());
        let mut pending = vec![Pending {
            node: root.clone(),
            // the top of the tree inherits automatic provisioning
            provisioning: Provisioning::Auto,
            scoped: descriptor.plan.as_ref().is_some_and(|plan| plan.scoped),
            descriptor,
        }];

        while let Some(Pending {
            node,
            descriptor,
            provisioning,
            scoped,
        }) = pending.pop()
        {
            for (artifact_type, name, range, properties, child_provisioning) in
                Self::references(&descriptor, provisioning)
            {
                let entry = match self.repository.find(artifact_type, &name, &range) {
                    Some(entry) => entry,
                    None if artifact_type == ArtifactType::Library => {
                        // import expansion reports the library if it is mandatory
                        tracing::debug!(library = %name, %range, "library not in repository");
                        continue;
                    }
                    None => {
                        return Err(DeploymentError::ArtifactNotFound {
                            artifact_type: artifact_type.to_string(),
                            name,
                            range: range.to_string(),
                        }
                        .into());
                    }
                };

                let identity = entry.descriptor.identity();
                if let Some(existing) = nodes.get(&identity) {
                    if !node.children().contains(existing) {
                        node.add_child(existing)?;
                    }
                    continue;
                }
                if !scoped {
                    if let Some(existing) = self.deployed_node(&identity) {
                        node.add_child(&existing)?;
                        tracing::debug!(parent = %node.value(), child = %existing.value(), "sharing deployed artifact");
                        nodes.insert(identity, existing);
                        continue;
                    }
                }

                let staged = self.storage.stage(&entry.source).await?;
                let child = self.dag.create_root_node(InstallArtifact::from_descriptor(
                    &entry.descriptor,
                    staged,
                ));
                for (key, value) in properties {
                    child.value().set_property(key, value);
                }
                node.add_child(&child)?;
                tracing::debug!(parent = %node.value(), child = %child.value(), "child added to tree");

                nodes.insert(identity, child.clone());
                let child_scoped =
                    scoped || entry.descriptor.plan.as_ref().is_some_and(|plan| plan.scoped);
                pending.push(Pending {
                    node: child,
                    descriptor: entry.descriptor,
                    provisioning: child_provisioning,
                    scoped: child_scoped,
                });
            }
        }
        Ok(())
    }

    /// Artifacts `descriptor` pulls into the tree
    fn references(
        descriptor: &ArtifactDescriptor,
        provisioning: Provisioning,
    ) -> Vec<(ArtifactType, String, VersionRange, Properties, Provisioning)> {
        let mut references = Vec::new();
        if let Some(plan) = &descriptor.plan {
            let effective = plan.provisioning.effective(provisioning);
            for child in &plan.children {
                references.push((
                    child.artifact_type,
                    child.name.clone(),
                    child.range.clone(),
                    child.properties.clone(),
                    effective,
                ));
            }
        }
        if let Some(library) = &descriptor.library {
            for module in &library.modules {
                references.push((
                    ArtifactType::Module,
                    module.name.clone(),
                    module.range.clone(),
                    Properties::new(),
                    provisioning,
                ));
            }
        }
        if provisioning == Provisioning::Auto {
            if let Some(manifest) = &descriptor.manifest {
                for import in &manifest.library_imports {
                    references.push((
                        ArtifactType::Library,
                        import.name.clone(),
                        import.range.clone(),
                        Properties::new(),
                        provisioning,
                    ));
                }
            }
        }
        references
    }
}
