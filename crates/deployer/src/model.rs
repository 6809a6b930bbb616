//! The deployed artifact trees

use dashmap::DashMap;
use mdk_artifact::ArtifactNode;
use mdk_types::{ArtifactIdentity, DeploymentIdentity};

/// Deployed trees keyed by normalized deployment URI
#[derive(Debug, Default)]
pub struct RuntimeArtifactModel {
    deployments: DashMap<String, ArtifactNode>,
}

impl RuntimeArtifactModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deployed tree, returning the tree it replaces
    pub fn insert(&self, uri: impl Into<String>, root: ArtifactNode) -> Option<ArtifactNode> {
        self.deployments.insert(uri.into(), root)
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<ArtifactNode> {
        self.deployments.get(uri).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.deployments.contains_key(uri)
    }

    pub fn remove(&self, uri: &str) -> Option<ArtifactNode> {
        self.deployments.remove(uri).map(|(_, root)| root)
    }

    /// The deployment whose root has `identity`
    #[must_use]
    pub fn get_by_identity(&self, identity: &ArtifactIdentity) -> Option<(String, ArtifactNode)> {
        self.deployments
            .iter()
            .find(|entry| entry.value().value().identity() == *identity)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }

    /// Any deployed node with `identity`, searching whole trees
    #[must_use]
    pub fn find_node(&self, identity: &ArtifactIdentity) -> Option<ArtifactNode> {
        self.deployments.iter().find_map(|entry| {
            entry
                .value()
                .find(|node| node.value().identity() == *identity)
        })
    }

    /// Whether `node` is the root of a deployment
    #[must_use]
    pub fn contains_root(&self, node: &ArtifactNode) -> bool {
        self.deployments.iter().any(|entry| entry.value() == node)
    }

    /// Every deployment, sorted by URI
    #[must_use]
    pub fn all(&self) -> Vec<(String, DeploymentIdentity)> {
        let mut all: Vec<(String, DeploymentIdentity)> = self
            .deployments
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    DeploymentIdentity::from(&entry.value().value().identity()),
                )
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_artifact::{ArtifactKind, InstallArtifact, StagedArtifact};
    use mdk_graph::Dag;
    use mdk_manifest::Manifest;
    use mdk_types::{ArtifactType, Properties, Version};

    fn node(dag: &Dag<InstallArtifact>, name: &str) -> ArtifactNode {
        dag.create_root_node(InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Module, name, Version::new(1, 0, 0)),
            ArtifactKind::Module {
                manifest: Manifest::default(),
            },
            StagedArtifact::new(name, name),
            Properties::new(),
        ))
    }

    #[test]
    fn test_lookup_by_uri_and_identity() {
        let dag = Dag::new();
        let root = node(&dag, "root");
        let child = node(&dag, "child");
        root.add_child(&child).unwrap();

        let model = RuntimeArtifactModel::new();
        assert!(model.insert("file:/a.toml", root.clone()).is_none());

        assert!(model.contains("file:/a.toml"));
        let (uri, _) = model.get_by_identity(&root.value().identity()).unwrap();
        assert_eq!(uri, "file:/a.toml");
        assert!(model.get_by_identity(&child.value().identity()).is_none());
        assert_eq!(model.find_node(&child.value().identity()), Some(child.clone()));
        assert!(model.contains_root(&root));
        assert!(!model.contains_root(&child));
        assert_eq!(model.all()[0].1.name, "root");

        assert!(model.remove("file:/a.toml").is_some());
        assert!(model.is_empty());
    }
}
