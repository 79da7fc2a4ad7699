//! HTTP server for STEMgraph

pub mod auth;
pub mod error;
pub mod handlers;
pub mod readiness;
pub mod router;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use stemgraph_core::SnapshotReader;
use stemgraph_refresher::{DEFAULT_REFRESH_INTERVAL, ReadModelCache, Refresher};
use stemgraph_store::GraphStore;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use readiness::{DEFAULT_READINESS_BACKOFF, wait_for_store};
pub use router::create_router;
pub use stemgraph_core::TreeLimits;

/// Where the dependency endpoints read the graph from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveFrom {
    /// Query the store on every request; writes are visible immediately.
    #[default]
    Store,
    /// Use the periodically refreshed snapshot.
    Cache,
}

impl FromStr for ResolveFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "store" => Ok(ResolveFrom::Store),
            "cache" => Ok(ResolveFrom::Cache),
            other => Err(format!("unknown resolver source '{other}', expected 'store' or 'cache'")),
        }
    }
}

impl fmt::Display for ResolveFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveFrom::Store => f.write_str("store"),
            ResolveFrom::Cache => f.write_str("cache"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub write_token: String,
    pub refresh_interval: Duration,
    pub readiness_backoff: Duration,
    pub resolve_from: ResolveFrom,
    pub tree_limits: TreeLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            write_token: String::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            readiness_backoff: DEFAULT_READINESS_BACKOFF,
            resolve_from: ResolveFrom::default(),
            tree_limits: TreeLimits::default(),
        }
    }
}

/// State shared by every request handler
pub struct ServerState {
    pub store: Arc<dyn GraphStore>,
    pub snapshots: SnapshotReader,
    pub resolve_from: ResolveFrom,
    pub tree_limits: TreeLimits,
    write_token: String,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn GraphStore>,
        snapshots: SnapshotReader,
        write_token: impl Into<String>,
        resolve_from: ResolveFrom,
    ) -> Self {
        Self {
            store,
            snapshots,
            resolve_from,
            tree_limits: TreeLimits::default(),
            write_token: write_token.into(),
        }
    }

    pub fn with_tree_limits(mut self, tree_limits: TreeLimits) -> Self {
        self.tree_limits = tree_limits;
        self
    }

    /// An empty key never grants access, even against an empty token.
    pub fn accepts_write_key(&self, key: &str) -> bool {
        !key.is_empty() && key == self.write_token
    }
}

/// The STEMgraph HTTP service: readiness gate, cache refresher and router.
pub struct StemgraphServer {
    store: Arc<dyn GraphStore>,
    config: ServerConfig,
}

impl StemgraphServer {
    pub fn new(store: Arc<dyn GraphStore>, config: ServerConfig) -> Self {
        Self { store, config }
    }

    /// Serve until Ctrl-C.
    pub async fn start(self) -> anyhow::Result<()> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Wait for the store, bind the configured address, then serve until
    /// `signal` resolves.
    pub async fn start_with_shutdown<F>(self, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = forward_signal(signal);
        if !self.wait_ready(shutdown.clone()).await {
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        self.run(listener, shutdown).await
    }

    /// Like [`start_with_shutdown`](Self::start_with_shutdown) on an
    /// already bound listener.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = forward_signal(signal);
        if !self.wait_ready(shutdown.clone()).await {
            return Ok(());
        }
        self.run(listener, shutdown).await
    }

    /// Returns `false` if shutdown was requested before the store answered.
    async fn wait_ready(&self, mut shutdown: watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = wait_for_store(self.store.as_ref(), self.config.readiness_backoff) => {}
            _ = shutdown.wait_for(|stop| *stop) => {
                tracing::info!("Shutdown requested before the graph store became ready");
                return false;
            }
        }

        if let Err(e) = self.store.prepare().await {
            tracing::warn!("Could not prepare graph store schema: {}", e);
        }
        true
    }

    async fn run(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let cache = ReadModelCache::new(Arc::clone(&self.store));
        let refresher = Refresher::new(cache, self.config.refresh_interval);
        let state = Arc::new(ServerState::new(
            Arc::clone(&self.store),
            refresher.reader(),
            self.config.write_token,
            self.config.resolve_from,
        )
        .with_tree_limits(self.config.tree_limits));

        let (stop_tx, stop_rx) = watch::channel(false);
        let refresh_task = refresher.spawn(stop_rx);

        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(
            "STEMgraph listening on http://{} (store: {}, resolving from {})",
            local,
            self.store.name(),
            state.resolve_from
        );

        let app = create_router(state);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;

        let _ = stop_tx.send(true);
        if let Err(e) = refresh_task.await {
            tracing::warn!("Refresher task ended abnormally: {}", e);
        }
        tracing::info!("Server stopped");

        served.context("server error")
    }
}

/// Turn a one-shot signal future into a shutdown flag.
fn forward_signal<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        signal.await;
        let _ = tx.send(true);
    });
    rx
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
pub(crate) const TEST_TOKEN: &str = "test-write-token";

#[cfg(test)]
pub(crate) struct Harness {
    pub state: Arc<ServerState>,
    pub store: Arc<stemgraph_store::MemoryStore>,
    pub cache: ReadModelCache,
}

#[cfg(test)]
pub(crate) fn harness(resolve_from: ResolveFrom) -> Harness {
    let store = Arc::new(stemgraph_store::MemoryStore::new());
    let cache = ReadModelCache::new(store.clone());
    let state = Arc::new(ServerState::new(
        store.clone(),
        cache.reader(),
        TEST_TOKEN,
        resolve_from,
    ));
    Harness { state, store, cache }
}
