#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Thread-safe directed acyclic graph for mdk
//!
//! A [`Dag`] owns an arena of nodes addressed by [`NodeId`]. Callers hold
//! [`GraphNode`] handles, which are cheap to clone and keep the arena alive.
//! Structural changes take the arena's write lock; traversals copy the
//! reachable subgraph under the read lock and walk the copy, so visitors may
//! freely mutate the graph they are walking.
//!
//! Nodes may have several parents. The graph never contains a cycle: every
//! edge insertion is checked and rejected with [`GraphError::Cyclic`].

mod node;
mod visit;

pub use node::{Dag, GraphNode, NodeId};
pub use visit::VisitControl;

pub use mdk_errors::GraphError;
