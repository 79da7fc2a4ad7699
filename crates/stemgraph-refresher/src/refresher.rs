//! Periodic rebuild of the in-memory read model

use std::sync::Arc;
use std::time::Duration;

use stemgraph_core::{GraphSnapshot, SnapshotCell, SnapshotReader};
use stemgraph_store::{GraphStore, StoreResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default period between two refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest period the refresher will tick at.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Snapshot of the whole graph, rebuilt from the store on demand.
pub struct ReadModelCache {
    store: Arc<dyn GraphStore>,
    cell: SnapshotCell,
}

impl ReadModelCache {
    /// Create a cache holding the empty start-up snapshot.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            cell: SnapshotCell::new(),
        }
    }

    /// Read-only handle to hand to request handlers.
    pub fn reader(&self) -> SnapshotReader {
        self.cell.reader()
    }

    pub fn get_snapshot(&self) -> Arc<GraphSnapshot> {
        self.cell.load()
    }

    /// Fetch all nodes and all edges, then publish them together.
    ///
    /// Both queries run concurrently. If either fails nothing is published
    /// and the previous snapshot stays current.
    pub async fn refresh(&self) -> StoreResult<Arc<GraphSnapshot>> {
        let (nodes, edges) =
            tokio::try_join!(self.store.fetch_nodes(), self.store.fetch_edges())?;
        debug!("Fetched {} nodes and {} edges from {}", nodes.len(), edges.len(), self.store.name());

        let snapshot = self.cell.publish(nodes, edges);
        info!(
            "Graph cache updated: generation {}, {} nodes, {} edges",
            snapshot.generation,
            snapshot.node_count(),
            snapshot.edge_count()
        );
        Ok(snapshot)
    }
}

/// Background task driving [`ReadModelCache::refresh`] on a fixed period.
pub struct Refresher {
    cache: ReadModelCache,
    interval: Duration,
}

impl Refresher {
    /// `interval` is raised to [`MIN_REFRESH_INTERVAL`] if shorter.
    pub fn new(cache: ReadModelCache, interval: Duration) -> Self {
        if interval < MIN_REFRESH_INTERVAL {
            warn!(
                "Refresh interval {:?} too short, using {:?}",
                interval, MIN_REFRESH_INTERVAL
            );
        }
        Self {
            cache,
            interval: interval.max(MIN_REFRESH_INTERVAL),
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        self.cache.reader()
    }

    /// Refresh immediately, then once per interval, until `shutdown` flips
    /// to `true` or its sender is dropped.
    ///
    /// A failed refresh is logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Refresher started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Refresher stopped");
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn tick(&self) {
        if let Err(e) = self.cache.refresh().await {
            let current = self.cache.get_snapshot();
            warn!(
                "Graph cache refresh failed, keeping generation {}: {}",
                current.generation, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use stemgraph_core::{Edge, NewNode, Node, NodeId};
    use stemgraph_store::{MemoryStore, StoreError, Subgraph};

    /// Store whose graph at version v is a ring of v nodes and v edges.
    #[derive(Default)]
    struct RingStore {
        version: AtomicI64,
        fail_edges: AtomicBool,
    }

    impl RingStore {
        fn set_version(&self, version: i64) {
            self.version.store(version, Ordering::SeqCst);
        }
    }

    fn ring_node(i: i64) -> Node {
        Node {
            id: NodeId(i),
            uuid: format!("n{i}"),
            name: format!("n{i}"),
            repo_domain: String::new(),
            description: String::new(),
            labels: Vec::new(),
            placeholder: false,
        }
    }

    #[async_trait]
    impl GraphStore for RingStore {
        async fn fetch_nodes(&self) -> StoreResult<Vec<Node>> {
            let v = self.version.load(Ordering::SeqCst);
            Ok((0..v).map(ring_node).collect())
        }

        async fn fetch_edges(&self) -> StoreResult<Vec<Edge>> {
            if self.fail_edges.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable);
            }
            let v = self.version.load(Ordering::SeqCst);
            Ok((0..v)
                .map(|i| Edge::builds_on(NodeId(i), NodeId((i + 1) % v)))
                .collect())
        }

        async fn find_nodes(&self, _identifier: &str) -> StoreResult<Vec<Node>> {
            Ok(Vec::new())
        }

        async fn upsert_node(&self, _node: &NewNode) -> StoreResult<NodeId> {
            Err(StoreError::Unavailable)
        }

        async fn link_builds_on(&self, _uuid: &str, _builds_on: &[String]) -> StoreResult<bool> {
            Err(StoreError::Unavailable)
        }

        async fn dependency_subgraph(&self, _uuid: &str) -> StoreResult<Subgraph> {
            Ok(Subgraph::default())
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "ring"
        }
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let store = Arc::new(RingStore::default());
        store.set_version(3);
        let cache = ReadModelCache::new(store);

        let snapshot = cache.refresh().await.unwrap();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(cache.reader().get_snapshot().edge_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let cache = ReadModelCache::new(store.clone());
        let before = cache.refresh().await.unwrap();

        store.set_available(false);
        assert!(cache.refresh().await.is_err());
        assert!(Arc::ptr_eq(&before, &cache.get_snapshot()));
    }

    #[tokio::test]
    async fn test_half_failed_refresh_never_mixes_generations() {
        let store = Arc::new(RingStore::default());
        store.set_version(2);
        let cache = ReadModelCache::new(store.clone());
        cache.refresh().await.unwrap();

        // Nodes would succeed at version 5, edges fail.
        store.set_version(5);
        store.fail_edges.store(true, Ordering::SeqCst);
        assert!(cache.refresh().await.is_err());

        let snapshot = cache.get_snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.edge_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_during_refreshes_see_consistent_pairs() {
        let store = Arc::new(RingStore::default());
        let cache = Arc::new(ReadModelCache::new(store.clone()));
        let reader = cache.reader();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let snapshot = reader.get_snapshot();
                        assert_eq!(snapshot.node_count(), snapshot.edge_count());
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for version in 1..=100 {
            store.set_version(version);
            cache.refresh().await.unwrap();
        }

        for handle in readers {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_refresher_survives_outage_and_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let refresher = Refresher::new(
            ReadModelCache::new(store.clone()),
            Duration::from_millis(20),
        );
        let reader = refresher.reader();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = refresher.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let first = reader.get_snapshot().generation;
        assert!(first >= 1, "startup refresh should have run");

        store.set_available(false);
        tokio::time::sleep(Duration::from_millis(60)).await;
        let during = reader.get_snapshot().generation;

        store.set_available(true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(reader.get_snapshot().generation > during);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_still_refreshes() {
        let store = Arc::new(RingStore::default());
        store.set_version(2);
        let refresher = Refresher::new(ReadModelCache::new(store), Duration::ZERO);
        let reader = refresher.reader();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = refresher.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(reader.get_snapshot().generation >= 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher should stop")
            .expect("refresher task should not panic");
    }
}
