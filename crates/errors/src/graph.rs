//! Graph structure error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphError {
    #[error("adding {child} as a child of {parent} would create a cycle")]
    Cyclic { parent: String, child: String },

    #[error("{child} is already a child of {parent}")]
    DuplicateEdge { parent: String, child: String },

    #[error("node {node} belongs to a different graph")]
    ForeignNode { node: String },

    #[error("node {node} has been deleted")]
    DeletedNode { node: String },
}

impl GraphError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Cyclic { .. } => "graph.cyclic",
            Self::DuplicateEdge { .. } => "graph.duplicate_edge",
            Self::ForeignNode { .. } => "graph.foreign_node",
            Self::DeletedNode { .. } => "graph.deleted_node",
        };
        Some(code)
    }
}
