//! End-to-end tests: the real router on an ephemeral port, backed by the
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use stemgraph_server::{ResolveFrom, ServerConfig, StemgraphServer, TreeLimits};
use stemgraph_store::MemoryStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const TOKEN: &str = "integration-token";

struct TestServer {
    base: String,
    client: reqwest::Client,
    store: Arc<MemoryStore>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(resolve_from: ResolveFrom) -> Self {
        Self::start_with(resolve_from, TreeLimits::default()).await
    }

    async fn start_with(resolve_from: ResolveFrom, tree_limits: TreeLimits) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(MemoryStore::new());

        let config = ServerConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            write_token: TOKEN.to_string(),
            refresh_interval: Duration::from_millis(50),
            readiness_backoff: Duration::from_millis(10),
            resolve_from,
            tree_limits,
        };

        let (shutdown, stop) = oneshot::channel::<()>();
        let server = StemgraphServer::new(store.clone(), config);
        let handle = tokio::spawn(server.serve_on(listener, async {
            let _ = stop.await;
        }));

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            store,
            shutdown,
            handle,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self.client.post(format!("{}{}", self.base, path)).json(&body);
        if let Some(key) = key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn add_node(&self, uuid: &str, builds_on: &[&str]) -> Value {
        let (status, body) = self
            .post(
                "/add_node",
                Some(TOKEN),
                json!({
                    "name": format!("Challenge {uuid}"),
                    "uuid": uuid,
                    "repo_domain": "github.com",
                    "builds_on": builds_on,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add_node {uuid} failed: {body}");
        body
    }

    /// Poll `/graph` until it reports `nodes` nodes.
    async fn wait_for_graph(&self, nodes: usize) -> Value {
        for _ in 0..100 {
            let (status, graph) = self.get("/graph").await;
            assert_eq!(status, StatusCode::OK);
            if graph["nodes"].as_array().map(Vec::len) == Some(nodes) {
                return graph;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("graph never reached {nodes} nodes");
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap();
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn test_writes_require_api_key() {
    let server = TestServer::start(ResolveFrom::Store).await;
    let body = json!({"name": "A", "uuid": "a", "repo_domain": "github.com"});

    let (status, error) = server.post("/add_node", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(error["detail"].is_string());

    let (status, _) = server.post("/add_node", Some("wrong"), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(server.store.node_count().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_builds_on_example() {
    let server = TestServer::start(ResolveFrom::Store).await;
    server.add_node("x1", &[]).await;
    server.add_node("x2", &["x1"]).await;

    let (status, list) = server.get("/builds_on_list/x2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!({"uuid": "x2", "builds_on": ["x1"]}));

    let (status, tree) = server.get("/builds_on_tree/x2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["uuid"], "x2");
    let root = &tree["builds_on_tree"];
    assert_eq!(root["uuid"], "x2");
    assert_eq!(root["children"][0]["uuid"], "x1");
    assert_eq!(root["children"][0]["children"], json!([]));

    let (_, list) = server.get("/builds_on_list/x1").await;
    assert_eq!(list["builds_on"], json!([]));

    server.stop().await;
}

#[tokio::test]
async fn test_cyclic_graph_terminates() {
    let server = TestServer::start(ResolveFrom::Store).await;
    server.add_node("a", &["b"]).await;
    server.add_node("b", &["c"]).await;
    server.add_node("c", &["a"]).await;

    let (status, list) = server.get("/builds_on_list/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["builds_on"], json!(["b", "c"]));

    let (status, tree) = server.get("/builds_on_tree/a").await;
    assert_eq!(status, StatusCode::OK);
    let c = &tree["builds_on_tree"]["children"][0]["children"][0];
    assert_eq!(c["uuid"], "c");
    assert_eq!(c["children"][0]["uuid"], "a");
    assert_eq!(c["children"][0]["cycle"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_resubmission_updates_in_place() {
    let server = TestServer::start(ResolveFrom::Store).await;
    let first = server.add_node("x1", &[]).await;

    let (status, second) = server
        .post(
            "/node",
            Some(TOKEN),
            json!({
                "name": "Renamed",
                "uuid": "x1",
                "repo_domain": "gitlab.com",
                "description": "second pass",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(server.store.node_count().await, 1);

    let (status, detail) = server.get("/get_detail/x1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Renamed");
    assert_eq!(detail["description"], "second pass");

    let id = second["id"].as_i64().unwrap();
    let (status, by_id) = server.get(&format!("/get_detail/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["uuid"], "x1");

    server.stop().await;
}

#[tokio::test]
async fn test_missing_dependency_becomes_placeholder() {
    let server = TestServer::start(ResolveFrom::Store).await;
    server.add_node("a", &["b"]).await;

    let (status, detail) = server.get("/get_detail/b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["uuid"], "b");
    assert_eq!(detail["placeholder"], true);

    server.add_node("b", &[]).await;
    let (_, detail) = server.get("/get_detail/b").await;
    assert!(detail.get("placeholder").is_none());

    server.stop().await;
}

#[tokio::test]
async fn test_bad_requests() {
    let server = TestServer::start(ResolveFrom::Store).await;

    let (status, _) = server.get("/get_detail/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .post("/add_node", Some(TOKEN), json!({"uuid": "a", "builds_on": ["a"], "name": "A", "repo_domain": "x"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .client
        .post(format!("{}/add_node", server.base))
        .header("X-API-Key", TOKEN)
        .json(&json!({"uuid": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    server.stop().await;
}

#[tokio::test]
async fn test_graph_follows_refresh_and_survives_outage() {
    let server = TestServer::start(ResolveFrom::Cache).await;
    server.add_node("x1", &[]).await;
    server.add_node("x2", &["x1"]).await;

    let graph = server.wait_for_graph(2).await;
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);
    assert_eq!(graph["edges"][0]["type"], "BUILDS_ON");

    let (status, list) = server.get("/builds_on_list/x2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["builds_on"], json!(["x1"]));

    let (status, health) = server.get("/healthcheck").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["cache"]["nodes"], 2);

    server.store.set_available(false);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (status, graph) = server.get("/graph").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);

    let (status, error) = server.get("/healthcheck").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error["detail"].is_string());

    let (status, _) = server.get("/get_detail/x1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    server.store.set_available(true);
    server.stop().await;
}

#[tokio::test]
async fn test_long_chain_tree_is_cut_off() {
    let limits = TreeLimits { max_depth: 8, max_nodes: 1_000 };
    let server = TestServer::start_with(ResolveFrom::Store, limits).await;
    server.add_node("c0", &[]).await;
    for i in 1..20 {
        server.add_node(&format!("c{i}"), &[&format!("c{}", i - 1)]).await;
    }

    let (status, list) = server.get("/builds_on_list/c19").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["builds_on"].as_array().unwrap().len(), 19);

    let (status, tree) = server.get("/builds_on_tree/c19").await;
    assert_eq!(status, StatusCode::OK);
    let mut node = &tree["builds_on_tree"];
    for _ in 0..8 {
        assert!(node.get("truncated").is_none());
        node = &node["children"][0];
    }
    assert_eq!(node["uuid"], "c11");
    assert_eq!(node["truncated"], true);
    assert_eq!(node["children"], json!([]));

    server.stop().await;
}
