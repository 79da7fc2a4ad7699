//! The graph store collaborator, as seen from the API

use async_trait::async_trait;
use stemgraph_core::{DependencyGraph, Edge, NewNode, Node, NodeId};

use crate::error::StoreResult;

/// Nodes and edges reachable from one root, read in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Subgraph {
    pub fn into_dependency_graph(self) -> DependencyGraph {
        DependencyGraph::from_parts(&self.nodes, &self.edges)
    }
}

/// Request/response access to a transactional graph database.
///
/// Every call is independent: implementations hold no lock across the
/// network round-trip and bound each call by their own timeout.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All live nodes, tombstoned rows excluded.
    async fn fetch_nodes(&self) -> StoreResult<Vec<Node>>;

    /// All live edges of every type.
    async fn fetch_edges(&self) -> StoreResult<Vec<Edge>>;

    /// Nodes whose store id, uuid or name equals `identifier`.
    async fn find_nodes(&self, identifier: &str) -> StoreResult<Vec<Node>>;

    /// Create the node if its uuid is unknown, otherwise update its mutable
    /// fields. Clears the placeholder flag either way.
    async fn upsert_node(&self, node: &NewNode) -> StoreResult<NodeId>;

    /// Idempotently add `uuid -[BUILDS_ON]-> dep` for every dep, creating
    /// placeholder nodes for deps that do not exist yet.
    ///
    /// Returns `false` without writing anything if `uuid` itself is unknown.
    async fn link_builds_on(&self, uuid: &str, builds_on: &[String]) -> StoreResult<bool>;

    /// The root, everything it transitively builds on, and the `BUILDS_ON`
    /// edges between them. Empty when the root is unknown.
    async fn dependency_subgraph(&self, uuid: &str) -> StoreResult<Subgraph>;

    /// Trivial round-trip used for health and readiness checks.
    async fn ping(&self) -> StoreResult<()>;

    /// One-off schema setup (uniqueness constraints). Default: nothing to do.
    async fn prepare(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Backend name for logs.
    fn name(&self) -> &str;
}
