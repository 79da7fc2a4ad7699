//! Point-in-time read model of the whole graph.
//!
//! A [`SnapshotCell`] holds the current [`GraphSnapshot`] behind an `Arc`.
//! Publishing assembles the new snapshot first and only takes the write lock
//! to swap the pointer; readers clone the `Arc` under a short read lock and
//! keep using their copy for as long as they like. Neither side ever holds
//! the lock across an `.await`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::graph::DependencyGraph;
use crate::model::{Edge, Node};

/// Full graph state as of one successful refresh.
#[derive(Debug)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// 0 for the empty start-up snapshot, +1 per successful refresh.
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    dependencies: OnceLock<DependencyGraph>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        GraphSnapshot {
            nodes: Vec::new(),
            edges: Vec::new(),
            generation: 0,
            refreshed_at: None,
            dependencies: OnceLock::new(),
        }
    }

    /// Build a snapshot, dropping edges whose endpoints are not among `nodes`.
    ///
    /// Endpoints go missing when a node was tombstoned or lacked a uuid.
    pub fn assemble(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        generation: u64,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        let known: HashSet<_> = nodes.iter().map(|n| n.id).collect();
        let total = edges.len();
        let edges: Vec<Edge> = edges
            .into_iter()
            .filter(|e| known.contains(&e.from) && known.contains(&e.to))
            .collect();
        if edges.len() < total {
            tracing::debug!(
                "Dropped {} edges with unknown endpoints from snapshot {}",
                total - edges.len(),
                generation
            );
        }

        GraphSnapshot {
            nodes,
            edges,
            generation,
            refreshed_at: Some(refreshed_at),
            dependencies: OnceLock::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// `BUILDS_ON` index over this snapshot, built on first use.
    pub fn dependency_graph(&self) -> &DependencyGraph {
        self.dependencies
            .get_or_init(|| DependencyGraph::from_parts(&self.nodes, &self.edges))
    }
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owner-side handle: the only way to replace the current snapshot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: Arc<RwLock<Arc<GraphSnapshot>>>,
    last_generation: AtomicU64,
}

impl SnapshotCell {
    pub fn new() -> Self {
        SnapshotCell {
            current: Arc::new(RwLock::new(Arc::new(GraphSnapshot::empty()))),
            last_generation: AtomicU64::new(0),
        }
    }

    /// Replace the snapshot wholesale. Returns the newly assembled snapshot.
    pub fn publish(&self, nodes: Vec<Node>, edges: Vec<Edge>) -> Arc<GraphSnapshot> {
        let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let next = Arc::new(GraphSnapshot::assemble(nodes, edges, generation, Utc::now()));
        self.install(Arc::clone(&next));
        next
    }

    /// Swap `next` in unless a newer generation is already current.
    fn install(&self, next: Arc<GraphSnapshot>) {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if next.generation > slot.generation {
            *slot = next;
        } else {
            tracing::debug!(
                "Snapshot generation {} superseded by {}",
                next.generation,
                slot.generation
            );
        }
    }

    pub fn load(&self) -> Arc<GraphSnapshot> {
        load(&self.current)
    }

    /// Read-only handle for request handlers.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            current: Arc::clone(&self.current),
        }
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable accessor for the current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    current: Arc<RwLock<Arc<GraphSnapshot>>>,
}

impl SnapshotReader {
    pub fn get_snapshot(&self) -> Arc<GraphSnapshot> {
        load(&self.current)
    }
}

fn load(current: &RwLock<Arc<GraphSnapshot>>) -> Arc<GraphSnapshot> {
    Arc::clone(&current.read().unwrap_or_else(PoisonError::into_inner))
}
