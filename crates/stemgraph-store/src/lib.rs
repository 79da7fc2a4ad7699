//! Graph store bridge for STEMgraph
//!
//! This crate talks to the graph database that owns the durable nodes and
//! edges: a Neo4j HTTP transactional endpoint in production, or an
//! in-process store for tests and local runs.

pub mod error;
pub mod memory;
pub mod neo4j;
pub mod store;


use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use neo4j::{Neo4jConfig, Neo4jStore};
pub use store::{GraphStore, Subgraph};

/// Which backend to talk to.
#[derive(Debug, Clone)]
pub enum Backend {
    Neo4j(Neo4jConfig),
    Memory,
}

/// Build the store for `backend`.
pub fn create_store(backend: Backend) -> StoreResult<Arc<dyn GraphStore>> {
    match backend {
        Backend::Neo4j(config) => Ok(Arc::new(Neo4jStore::new(config)?)),
        Backend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
