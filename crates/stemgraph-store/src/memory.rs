//! In-process graph store with the same write semantics as the Neo4j backend

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use stemgraph_core::lookup::rank;
use stemgraph_core::{CHALLENGE_LABEL, Edge, EdgeKind, NewNode, Node, NodeId};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{GraphStore, Subgraph};

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    next_id: i64,
}

impl Inner {
    fn id_of(&self, uuid: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.uuid == uuid).map(|n| n.id)
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Find `uuid`, or create it as a placeholder.
    fn merge_placeholder(&mut self, uuid: &str) -> NodeId {
        if let Some(id) = self.id_of(uuid) {
            return id;
        }
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node {
                id,
                uuid: uuid.to_string(),
                name: String::new(),
                repo_domain: String::new(),
                description: String::new(),
                labels: vec![CHALLENGE_LABEL.to_string()],
                placeholder: true,
            },
        );
        id
    }

    fn merge_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }
}

/// Graph store kept in memory, for tests and `serve --memory`.
///
/// [`MemoryStore::set_available`] simulates an outage: every call fails with
/// [`StoreError::Unavailable`] until the store is switched back on.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Add an edge of any type between two existing uuids.
    pub async fn insert_edge(&self, from: &str, to: &str, kind: EdgeKind) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let (Some(from), Some(to)) = (inner.id_of(from), inner.id_of(to)) else {
            return Err(StoreError::Malformed(format!("unknown endpoint in {from} -> {to}")));
        };
        inner.merge_edge(Edge { from, to, kind });
        Ok(())
    }

    /// Add a bare node under `label`, the way nodes created outside this
    /// API look.
    pub async fn insert_labelled(&self, uuid: &str, name: &str, label: &str) -> NodeId {
        let mut inner = self.inner.write().await;
        let id = inner.allocate();
        inner.nodes.insert(
            id,
            Node {
                id,
                uuid: uuid.to_string(),
                name: name.to_string(),
                repo_domain: String::new(),
                description: String::new(),
                labels: vec![label.to_string()],
                placeholder: false,
            },
        );
        id
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    fn check(&self) -> StoreResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn fetch_nodes(&self) -> StoreResult<Vec<Node>> {
        self.check()?;
        Ok(self.inner.read().await.nodes.values().cloned().collect())
    }

    async fn fetch_edges(&self) -> StoreResult<Vec<Edge>> {
        self.check()?;
        Ok(self.inner.read().await.edges.clone())
    }

    async fn find_nodes(&self, identifier: &str) -> StoreResult<Vec<Node>> {
        self.check()?;
        let inner = self.inner.read().await;
        let mut matches: Vec<_> = inner
            .nodes
            .values()
            .filter_map(|n| rank(identifier, n).map(|r| (r, n)))
            .collect();
        matches.sort_by_key(|(r, n)| (*r, n.id));
        Ok(matches.into_iter().take(25).map(|(_, n)| n.clone()).collect())
    }

    async fn upsert_node(&self, node: &NewNode) -> StoreResult<NodeId> {
        self.check()?;
        let mut inner = self.inner.write().await;
        let id = inner.merge_placeholder(&node.uuid);
        if let Some(stored) = inner.nodes.get_mut(&id) {
            stored.name = node.name.clone();
            stored.repo_domain = node.repo_domain.clone();
            stored.description = node.description.clone();
            stored.placeholder = false;
            if !stored.labels.iter().any(|l| l == CHALLENGE_LABEL) {
                stored.labels.push(CHALLENGE_LABEL.to_string());
            }
        }
        Ok(id)
    }

    async fn link_builds_on(&self, uuid: &str, builds_on: &[String]) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.write().await;
        let Some(from) = inner.id_of(uuid) else {
            return Ok(false);
        };
        for dep in builds_on {
            let to = inner.merge_placeholder(dep);
            inner.merge_edge(Edge::builds_on(from, to));
        }
        Ok(true)
    }

    async fn dependency_subgraph(&self, uuid: &str) -> StoreResult<Subgraph> {
        self.check()?;
        let inner = self.inner.read().await;
        let Some(root) = inner.id_of(uuid) else {
            return Ok(Subgraph::default());
        };

        let mut reached = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for edge in inner.edges.iter().filter(|e| e.is_builds_on() && e.from == current) {
                if reached.insert(edge.to) {
                    queue.push_back(edge.to);
                }
            }
        }

        Ok(Subgraph {
            nodes: inner
                .nodes
                .values()
                .filter(|n| reached.contains(&n.id))
                .cloned()
                .collect(),
            edges: inner
                .edges
                .iter()
                .filter(|e| e.is_builds_on() && reached.contains(&e.from))
                .cloned()
                .collect(),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
