//! Arena storage and node handles

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mdk_errors::GraphError;

use crate::visit::{Snapshot, VisitControl};

/// Identifier of a node inside one [`Dag`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

struct Slot<T> {
    value: Arc<T>,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

struct Arena<T> {
    nodes: HashMap<NodeId, Slot<T>>,
    next_id: u64,
}

impl<T> Arena<T> {
    fn slot(&self, id: NodeId) -> Result<&Slot<T>, GraphError> {
        self.nodes.get(&id).ok_or_else(|| GraphError::DeletedNode {
            node: id.to_string(),
        })
    }

    /// Whether `target` is reachable from `from` by following child edges
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id) {
                if let Some(slot) = self.nodes.get(&id) {
                    stack.extend(slot.children.iter().copied());
                }
            }
        }
        false
    }

    fn snapshot(&self, root: NodeId) -> Snapshot<T> {
        let mut nodes = HashMap::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if nodes.contains_key(&id) {
                continue;
            }
            if let Some(slot) = self.nodes.get(&id) {
                stack.extend(slot.children.iter().copied());
                nodes.insert(id, (Arc::clone(&slot.value), slot.children.clone()));
            }
        }
        Snapshot { root, nodes }
    }
}

struct DagInner<T> {
    arena: RwLock<Arena<T>>,
}

impl<T> DagInner<T> {
    // A panicking visitor never holds the lock, so a poisoned arena is still
    // structurally consistent.
    fn read(&self) -> RwLockReadGuard<'_, Arena<T>> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena<T>> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A directed acyclic graph of shared values
pub struct Dag<T> {
    inner: Arc<DagInner<T>>,
}

impl<T> Clone for Dag<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Dag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Dag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dag")
            .field("nodes", &self.inner.read().nodes.len())
            .finish()
    }
}

impl<T> Dag<T> {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DagInner {
                arena: RwLock::new(Arena {
                    nodes: HashMap::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Add a parentless node holding `value`
    pub fn create_root_node(&self, value: T) -> GraphNode<T> {
        let value = Arc::new(value);
        let mut arena = self.inner.write();
        let id = NodeId(arena.next_id);
        arena.next_id += 1;
        arena.nodes.insert(
            id,
            Slot {
                value: Arc::clone(&value),
                parents: Vec::new(),
                children: Vec::new(),
            },
        );
        GraphNode {
            dag: Arc::clone(&self.inner),
            id,
            value,
        }
    }

    /// Delete a parentless node and detach its child edges
    ///
    /// Children that lose their last parent become root nodes; they are not
    /// deleted. Returns `false` if the node still has parents, was already
    /// deleted or belongs to another graph.
    pub fn delete(&self, node: &GraphNode<T>) -> bool {
        if !Arc::ptr_eq(&self.inner, &node.dag) {
            return false;
        }
        let mut arena = self.inner.write();
        match arena.nodes.get(&node.id) {
            Some(slot) if slot.parents.is_empty() => {}
            _ => return false,
        }
        let Some(slot) = arena.nodes.remove(&node.id) else {
            return false;
        };
        for child in slot.children {
            if let Some(child_slot) = arena.nodes.get_mut(&child) {
                child_slot.parents.retain(|p| *p != node.id);
            }
        }
        tracing::trace!(node = %node.id, "deleted graph node");
        true
    }

    /// Number of live nodes in the whole graph
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// All parentless nodes
    #[must_use]
    pub fn roots(&self) -> Vec<GraphNode<T>> {
        let arena = self.inner.read();
        let mut roots: Vec<_> = arena
            .nodes
            .iter()
            .filter(|(_, slot)| slot.parents.is_empty())
            .map(|(id, slot)| GraphNode {
                dag: Arc::clone(&self.inner),
                id: *id,
                value: Arc::clone(&slot.value),
            })
            .collect();
        roots.sort_by_key(|node| node.id);
        roots
    }
}

/// Handle to one node of a [`Dag`]
///
/// Equality and hashing use node identity, not the value.
pub struct GraphNode<T> {
    dag: Arc<DagInner<T>>,
    id: NodeId,
    value: Arc<T>,
}

impl<T> Clone for GraphNode<T> {
    fn clone(&self) -> Self {
        Self {
            dag: Arc::clone(&self.dag),
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> PartialEq for GraphNode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.dag, &other.dag)
    }
}

impl<T> Eq for GraphNode<T> {}

impl<T> Hash for GraphNode<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for GraphNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

impl<T> GraphNode<T> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Shared handle to the value
    #[must_use]
    pub fn value_arc(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// The graph this node belongs to
    #[must_use]
    pub fn dag(&self) -> Dag<T> {
        Dag {
            inner: Arc::clone(&self.dag),
        }
    }

    fn handle(&self, id: NodeId, value: &Arc<T>) -> Self {
        Self {
            dag: Arc::clone(&self.dag),
            id,
            value: Arc::clone(value),
        }
    }

    fn handles(&self, arena: &Arena<T>, ids: &[NodeId]) -> Vec<Self> {
        ids.iter()
            .filter_map(|id| arena.nodes.get(id).map(|slot| self.handle(*id, &slot.value)))
            .collect()
    }

    /// Add `child` under this node
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Cyclic` if `child` is this node or one of its
    /// ancestors, `DuplicateEdge` if the edge exists, `ForeignNode` if
    /// `child` belongs to another graph and `DeletedNode` if either end was
    /// deleted. The graph is unchanged on error.
    pub fn add_child(&self, child: &GraphNode<T>) -> Result<(), GraphError> {
        if !Arc::ptr_eq(&self.dag, &child.dag) {
            return Err(GraphError::ForeignNode {
                node: child.id.to_string(),
            });
        }

        let mut arena = self.dag.write();
        arena.slot(self.id)?;
        let child_slot = arena.slot(child.id)?;

        if child_slot.parents.contains(&self.id) {
            return Err(GraphError::DuplicateEdge {
                parent: self.id.to_string(),
                child: child.id.to_string(),
            });
        }
        if arena.reaches(child.id, self.id) {
            return Err(GraphError::Cyclic {
                parent: self.id.to_string(),
                child: child.id.to_string(),
            });
        }

        if let Some(slot) = arena.nodes.get_mut(&self.id) {
            slot.children.push(child.id);
        }
        if let Some(slot) = arena.nodes.get_mut(&child.id) {
            slot.parents.push(self.id);
        }
        Ok(())
    }

    /// Remove the edge to `child`, returning whether it existed
    pub fn remove_child(&self, child: &GraphNode<T>) -> bool {
        if !Arc::ptr_eq(&self.dag, &child.dag) {
            return false;
        }
        let mut arena = self.dag.write();
        let removed = match arena.nodes.get_mut(&self.id) {
            Some(slot) => {
                let before = slot.children.len();
                slot.children.retain(|c| *c != child.id);
                slot.children.len() != before
            }
            None => false,
        };
        if removed {
            if let Some(slot) = arena.nodes.get_mut(&child.id) {
                slot.parents.retain(|p| *p != self.id);
            }
        }
        removed
    }

    #[must_use]
    pub fn children(&self) -> Vec<GraphNode<T>> {
        let arena = self.dag.read();
        match arena.nodes.get(&self.id) {
            Some(slot) => self.handles(&arena, &slot.children),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn parents(&self) -> Vec<GraphNode<T>> {
        let arena = self.dag.read();
        match arena.nodes.get(&self.id) {
            Some(slot) => self.handles(&arena, &slot.parents),
            None => Vec::new(),
        }
    }

    /// Whether the node has no parents
    #[must_use]
    pub fn is_root_node(&self) -> bool {
        self.dag
            .read()
            .nodes
            .get(&self.id)
            .is_some_and(|slot| slot.parents.is_empty())
    }

    /// Whether the node is still part of its graph
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.dag.read().nodes.contains_key(&self.id)
    }

    /// Number of distinct nodes in the subgraph rooted here, this node included
    #[must_use]
    pub fn size(&self) -> usize {
        self.dag.read().snapshot(self.id).nodes.len()
    }

    /// Visit this node and its descendants depth-first, each once
    pub fn visit(&self, mut visitor: impl FnMut(&GraphNode<T>) -> VisitControl) {
        let result: Result<(), std::convert::Infallible> =
            self.try_visit(|node| Ok(visitor(node)));
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Visit like [`GraphNode::visit`], stopping at the first error
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `visitor`.
    pub fn try_visit<E>(
        &self,
        mut visitor: impl FnMut(&GraphNode<T>) -> Result<VisitControl, E>,
    ) -> Result<(), E> {
        let snapshot = self.dag.read().snapshot(self.id);
        snapshot.walk(|id, value| visitor(&self.handle(id, value)))
    }

    /// First node in depth-first order matching `predicate`
    #[must_use]
    pub fn find(&self, mut predicate: impl FnMut(&GraphNode<T>) -> bool) -> Option<GraphNode<T>> {
        let mut found = None;
        self.visit(|node| {
            if found.is_some() {
                return VisitControl::SkipChildren;
            }
            if predicate(node) {
                found = Some(node.clone());
                return VisitControl::SkipChildren;
            }
            VisitControl::Continue
        });
        found
    }

    /// All nodes of the subgraph in depth-first pre-order
    #[must_use]
    pub fn descendants(&self) -> Vec<GraphNode<T>> {
        let mut nodes = Vec::new();
        self.visit(|node| {
            nodes.push(node.clone());
            VisitControl::Continue
        });
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_child_rejects_self_and_ancestor() {
        let dag = Dag::new();
        let a = dag.create_root_node("a");
        let b = dag.create_root_node("b");
        a.add_child(&b).unwrap();

        assert!(matches!(a.add_child(&a), Err(GraphError::Cyclic { .. })));
        assert!(matches!(b.add_child(&a), Err(GraphError::Cyclic { .. })));
        assert!(matches!(
            a.add_child(&b),
            Err(GraphError::DuplicateEdge { .. })
        ));
        assert_eq!(a.children(), vec![b.clone()]);
        assert_eq!(b.parents(), vec![a.clone()]);
    }

    #[test]
    fn test_foreign_node_rejected() {
        let first = Dag::new();
        let second = Dag::new();
        let a = first.create_root_node(1);
        let b = second.create_root_node(2);
        assert!(matches!(
            a.add_child(&b),
            Err(GraphError::ForeignNode { .. })
        ));
        assert!(!a.remove_child(&b));
    }

    #[test]
    fn test_shared_child_counted_once() {
        let dag = Dag::new();
        let root = dag.create_root_node("root");
        let left = dag.create_root_node("left");
        let right = dag.create_root_node("right");
        let shared = dag.create_root_node("shared");

        root.add_child(&left).unwrap();
        root.add_child(&right).unwrap();
        left.add_child(&shared).unwrap();
        right.add_child(&shared).unwrap();

        assert_eq!(root.size(), 4);
        assert_eq!(shared.parents().len(), 2);
        assert!(!shared.is_root_node());

        let mut seen = Vec::new();
        root.visit(|node| {
            seen.push(*node.value());
            VisitControl::Continue
        });
        assert_eq!(seen, vec!["root", "left", "shared", "right"]);
    }

    #[test]
    fn test_skip_children() {
        let dag = Dag::new();
        let root = dag.create_root_node(0);
        let child = dag.create_root_node(1);
        let grandchild = dag.create_root_node(2);
        root.add_child(&child).unwrap();
        child.add_child(&grandchild).unwrap();

        let mut seen = Vec::new();
        root.visit(|node| {
            seen.push(*node.value());
            if *node.value() == 1 {
                VisitControl::SkipChildren
            } else {
                VisitControl::Continue
            }
        });
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_try_visit_stops_on_error() {
        let dag = Dag::new();
        let root = dag.create_root_node(0);
        for i in 1..=3 {
            root.add_child(&dag.create_root_node(i)).unwrap();
        }

        let mut visited = 0;
        let result = root.try_visit(|node| {
            visited += 1;
            if *node.value() == 2 {
                Err("stop")
            } else {
                Ok(VisitControl::Continue)
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_visitor_may_mutate_graph() {
        let dag = Dag::new();
        let root = dag.create_root_node(0);
        let child = dag.create_root_node(1);
        root.add_child(&child).unwrap();

        root.visit(|node| {
            if *node.value() == 0 {
                let extra = node.dag().create_root_node(9);
                node.add_child(&extra).unwrap();
            }
            VisitControl::Continue
        });
        assert_eq!(root.size(), 3);
    }

    #[test]
    fn test_delete_only_parentless() {
        let dag = Dag::new();
        let root = dag.create_root_node("root");
        let child = dag.create_root_node("child");
        root.add_child(&child).unwrap();

        assert!(!dag.delete(&child));
        assert!(dag.delete(&root));
        assert!(!root.is_live());
        assert!(child.is_root_node());
        assert!(matches!(
            root.add_child(&child),
            Err(GraphError::DeletedNode { .. })
        ));
        assert_eq!(dag.node_count(), 1);
    }

    #[test]
    fn test_find() {
        let dag = Dag::new();
        let root = dag.create_root_node(0);
        let child = dag.create_root_node(5);
        root.add_child(&child).unwrap();

        assert_eq!(root.find(|n| *n.value() == 5), Some(child));
        assert_eq!(root.find(|n| *n.value() == 7), None);
    }
}
