//! Startup gate: hold off serving until the graph store answers

use std::time::Duration;

use stemgraph_store::GraphStore;
use tracing::{info, warn};

/// Default wait between two readiness probes.
pub const DEFAULT_READINESS_BACKOFF: Duration = Duration::from_secs(5);

/// Ping the store until it answers, sleeping `backoff` between attempts.
///
/// Never gives up. Returns the number of attempts it took.
pub async fn wait_for_store(store: &dyn GraphStore, backoff: Duration) -> u32 {
    let mut attempt = 1;
    loop {
        match store.ping().await {
            Ok(()) => {
                info!("Graph store {} is ready (attempt {})", store.name(), attempt);
                return attempt;
            }
            Err(e) => {
                warn!(
                    "Graph store {} not ready (attempt {}): {}. Retrying in {:?}",
                    store.name(),
                    attempt,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
