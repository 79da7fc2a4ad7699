//! `BUILDS_ON` index using petgraph::DiGraph keyed by node uuid

use crate::model::*;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::HashMap;

/// Directed graph of nodes connected by their `BUILDS_ON` edges only.
///
/// An edge `a -> b` means "a builds on b". Parallel edges collapse into one.
pub struct DependencyGraph {
    inner: DiGraph<Node, ()>,
    by_uuid: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: DiGraph::new(),
            by_uuid: HashMap::new(),
        }
    }

    /// Index `nodes` and the `BUILDS_ON` subset of `edges`.
    ///
    /// Edges referring to unknown store ids are skipped. If two nodes share a
    /// uuid the first one wins.
    pub fn from_parts(nodes: &[Node], edges: &[Edge]) -> Self {
        let mut graph = DependencyGraph::new();
        let mut by_id = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if let Some(idx) = graph.add_node(node.clone()) {
                by_id.insert(node.id, idx);
            }
        }

        for edge in edges.iter().filter(|e| e.is_builds_on()) {
            match (by_id.get(&edge.from), by_id.get(&edge.to)) {
                (Some(&from), Some(&to)) => {
                    graph.inner.update_edge(from, to, ());
                }
                _ => tracing::debug!(
                    "Skipping BUILDS_ON edge {} -> {} with unknown endpoint",
                    edge.from,
                    edge.to
                ),
            }
        }

        graph
    }

    /// Add a node. Returns `None` if its uuid is already indexed.
    fn add_node(&mut self, node: Node) -> Option<NodeIndex> {
        if self.by_uuid.contains_key(&node.uuid) {
            tracing::warn!("Duplicate uuid {} (store id {}) ignored", node.uuid, node.id);
            return None;
        }
        let uuid = node.uuid.clone();
        let idx = self.inner.add_node(node);
        self.by_uuid.insert(uuid, idx);
        Some(idx)
    }

    /// Get a node by uuid.
    pub fn node(&self, uuid: &str) -> Option<&Node> {
        self.by_uuid
            .get(uuid)
            .and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of `BUILDS_ON` edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Direct `BUILDS_ON` targets of a node, ordered by uuid.
    pub fn builds_on(&self, uuid: &str) -> Vec<&Node> {
        let Some(&idx) = self.by_uuid.get(uuid) else {
            return Vec::new();
        };
        let mut targets: Vec<&Node> = self
            .inner
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|n| self.inner.node_weight(n))
            .collect();
        targets.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        targets
    }

    /// Every node reachable from `uuid`, the start node included.
    ///
    /// petgraph's `Dfs` keeps its own discovered set, so cycles are walked once.
    pub fn reachable_from(&self, uuid: &str) -> Vec<&Node> {
        let Some(&start) = self.by_uuid.get(uuid) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.inner, start);
        let mut reached = Vec::new();
        while let Some(idx) = dfs.next(&self.inner) {
            if let Some(node) = self.inner.node_weight(idx) {
                reached.push(node);
            }
        }
        reached
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
