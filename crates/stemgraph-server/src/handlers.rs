//! REST API handlers for the STEMgraph server

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stemgraph_core::{
    DependencyGraph, DependencyTree, Edge, Error, NewNode, Node, NodeId, closure, pick_match,
    tree_with_limits,
};

use crate::{ResolveFrom, ServerState, auth::WriteAccess, error::ApiError};

/// Response structure for the graph API
#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Serialize)]
pub struct AddNodeResponse {
    pub id: NodeId,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BuildsOnList {
    pub uuid: String,
    pub builds_on: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildsOnTree {
    pub uuid: String,
    pub builds_on_tree: DependencyTree,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub cache: CacheStatus,
}

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub nodes: usize,
    pub edges: usize,
}

/// GET `/graph` - every node and edge of the current snapshot.
pub async fn get_graph(State(state): State<Arc<ServerState>>) -> Json<GraphResponse> {
    let snapshot = state.snapshots.get_snapshot();
    tracing::debug!(
        "Serving graph generation {} ({} nodes, {} edges)",
        snapshot.generation,
        snapshot.node_count(),
        snapshot.edge_count()
    );

    Json(GraphResponse {
        nodes: snapshot.nodes.clone(),
        edges: snapshot.edges.clone(),
    })
}

/// GET `/get_detail/:identifier` - look a node up by store id, uuid or name.
pub async fn get_detail(
    State(state): State<Arc<ServerState>>,
    Path(identifier): Path<String>,
) -> Result<Json<Node>, ApiError> {
    let candidates = state.store.find_nodes(&identifier).await?;
    let node = pick_match(&identifier, candidates)?;
    Ok(Json(node))
}

/// POST `/add_node` (alias `/node`) - upsert a node and its `BUILDS_ON` links.
pub async fn add_node(
    State(state): State<Arc<ServerState>>,
    _access: WriteAccess,
    Json(new_node): Json<NewNode>,
) -> Result<Json<AddNodeResponse>, ApiError> {
    new_node.validate()?;

    let id = state.store.upsert_node(&new_node).await?;
    let dependencies = new_node.dependencies();
    link_builds_on(&state, &new_node.uuid, &dependencies).await?;

    tracing::info!(
        "Node {} saved with id {} ({} dependencies)",
        new_node.uuid,
        id,
        dependencies.len()
    );
    Ok(Json(AddNodeResponse {
        id,
        message: format!("Node {} created or updated", new_node.uuid),
    }))
}

/// Link `uuid` to each of `builds_on`, creating placeholders as needed.
pub async fn link_builds_on(
    state: &ServerState,
    uuid: &str,
    builds_on: &[String],
) -> Result<(), ApiError> {
    if builds_on.is_empty() {
        return Ok(());
    }
    if state.store.link_builds_on(uuid, builds_on).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("node {uuid} does not exist")).into())
    }
}

/// GET `/builds_on_list/:uuid` - transitive `BUILDS_ON` closure.
pub async fn builds_on_list(
    State(state): State<Arc<ServerState>>,
    Path(uuid): Path<String>,
) -> Result<Json<BuildsOnList>, ApiError> {
    let builds_on = resolve(&state, &uuid, |graph| closure(graph, &uuid)).await?;
    Ok(Json(BuildsOnList { uuid, builds_on }))
}

/// GET `/builds_on_tree/:uuid` - `BUILDS_ON` relation expanded as a tree.
pub async fn builds_on_tree(
    State(state): State<Arc<ServerState>>,
    Path(uuid): Path<String>,
) -> Result<Json<BuildsOnTree>, ApiError> {
    let limits = state.tree_limits;
    let builds_on_tree =
        resolve(&state, &uuid, |graph| tree_with_limits(graph, &uuid, limits)).await?;
    Ok(Json(BuildsOnTree {
        uuid,
        builds_on_tree,
    }))
}

/// Run `f` over the dependency graph for `uuid`, taken from wherever the
/// server is configured to resolve from.
async fn resolve<T>(
    state: &ServerState,
    uuid: &str,
    f: impl FnOnce(&DependencyGraph) -> T,
) -> Result<T, ApiError> {
    match state.resolve_from {
        ResolveFrom::Cache => {
            let snapshot = state.snapshots.get_snapshot();
            Ok(f(snapshot.dependency_graph()))
        }
        ResolveFrom::Store => {
            let graph = state
                .store
                .dependency_subgraph(uuid)
                .await?
                .into_dependency_graph();
            Ok(f(&graph))
        }
    }
}

/// GET `/healthcheck` - live round-trip to the store plus cache status.
pub async fn health_check(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    state.store.ping().await?;

    let snapshot = state.snapshots.get_snapshot();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.name().to_string(),
        cache: CacheStatus {
            generation: snapshot.generation,
            refreshed_at: snapshot.refreshed_at,
            nodes: snapshot.node_count(),
            edges: snapshot.edge_count(),
        },
    }))
}
