//! Depth-first traversal over a snapshot of a subgraph

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::node::NodeId;

/// What a visitor wants to happen after it has seen a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    /// Descend into the node's children
    Continue,
    /// Do not descend into the node's children
    SkipChildren,
}

/// Reachable part of the graph copied out from under the read lock
pub(crate) struct Snapshot<T> {
    pub(crate) root: NodeId,
    pub(crate) nodes: HashMap<NodeId, (Arc<T>, Vec<NodeId>)>,
}

impl<T> Snapshot<T> {
    /// Walk the snapshot in depth-first pre-order, visiting each node once
    ///
    /// A node reachable along several paths is visited on the first path
    /// that reaches it; a `SkipChildren` on that visit does not hide the
    /// node's children from other paths that reach them independently.
    pub(crate) fn walk<E>(
        &self,
        mut visitor: impl FnMut(NodeId, &Arc<T>) -> Result<VisitControl, E>,
    ) -> Result<(), E> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some((value, children)) = self.nodes.get(&id) else {
                continue;
            };
            if visitor(id, value)? == VisitControl::Continue {
                // reversed so the first child is visited first
                stack.extend(children.iter().rev().filter(|c| !seen.contains(*c)));
            }
        }
        Ok(())
    }
}
