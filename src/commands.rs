//! CLI command implementations

use anyhow::Context;
use stemgraph_refresher::ReadModelCache;
use stemgraph_server::StemgraphServer;
use stemgraph_store::{Backend, create_store};

use crate::config::{self, FileConfig, ServeArgs, StoreArgs};

pub async fn serve(file: &FileConfig, args: ServeArgs) -> anyhow::Result<()> {
    let server_config = config::server_config(file, &args)?;

    let backend = if args.memory {
        tracing::warn!("Serving from the in-memory store; nothing will be persisted");
        Backend::Memory
    } else {
        let store_config = config::store_config(file, &args.store)?;
        tracing::info!("Using graph store at {} (database {})", store_config.url, store_config.database);
        Backend::Neo4j(store_config)
    };
    let store = create_store(backend).context("failed to create graph store client")?;

    tracing::info!(
        "Starting STEMgraph server on {}:{}",
        server_config.host,
        server_config.port
    );
    StemgraphServer::new(store, server_config).start().await
}

/// One health check and one full refresh, then exit.
pub async fn check(file: &FileConfig, args: StoreArgs) -> anyhow::Result<()> {
    let store_config = config::store_config(file, &args)?;
    let url = store_config.url.clone();
    let store = create_store(Backend::Neo4j(store_config))
        .context("failed to create graph store client")?;

    store
        .ping()
        .await
        .with_context(|| format!("graph store at {url} is not reachable"))?;

    let cache = ReadModelCache::new(store);
    let snapshot = cache
        .refresh()
        .await
        .context("failed to load the graph")?;

    println!(
        "{}: {} nodes, {} edges",
        url,
        snapshot.node_count(),
        snapshot.edge_count()
    );
    Ok(())
}
