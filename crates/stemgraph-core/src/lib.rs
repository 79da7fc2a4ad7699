//! STEMgraph Core — read model, dependency resolution and shared types

pub mod error;
pub mod graph;
pub mod lookup;
pub mod model;
pub mod resolver;
pub mod snapshot;


#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use lookup::{MatchRank, pick_match};
pub use model::{CHALLENGE_LABEL, Edge, EdgeKind, NewNode, Node, NodeId};
pub use resolver::{
    DEFAULT_MAX_TREE_DEPTH, DEFAULT_MAX_TREE_NODES, DependencyTree, TreeLimits, closure, tree,
    tree_with_limits,
};
pub use snapshot::{GraphSnapshot, SnapshotCell, SnapshotReader};
