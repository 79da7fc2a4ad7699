//! Axum router setup for the STEMgraph server

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    ServerState,
    handlers::{add_node, builds_on_list, builds_on_tree, get_detail, get_graph, health_check},
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Reads
        .route("/graph", get(get_graph))
        .route("/get_detail/:identifier", get(get_detail))
        .route("/builds_on_list/:uuid", get(builds_on_list))
        .route("/builds_on_tree/:uuid", get(builds_on_tree))
        .route("/healthcheck", get(health_check))
        // Writes
        .route("/add_node", post(add_node))
        .route("/node", post(add_node))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
