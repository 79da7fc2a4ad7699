//! Neo4j HTTP transactional endpoint backend

mod decode;
pub mod queries;
pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use stemgraph_core::{Edge, NewNode, Node, NodeId};

use crate::error::{StoreError, StoreResult};
use crate::store::{GraphStore, Subgraph};
use wire::{Statement, StatementResult, TxRequest, TxResponse};

/// Connection settings for [`Neo4jStore`].
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// Base URL, e.g. `http://localhost:7474`
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Applied to both connecting and the whole request.
    pub timeout: Duration,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            user: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

pub struct Neo4jStore {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
    timeout: Duration,
}

impl Neo4jStore {
    pub fn new(config: Neo4jConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: commit_endpoint(&config.url, &config.database),
            user: config.user,
            password: config.password,
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `statements` as one auto-commit transaction.
    async fn run(&self, statements: Vec<Statement<'_>>) -> StoreResult<Vec<StatementResult>> {
        let expected = statements.len();
        let request = TxRequest { statements };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: TxResponse = response.json().await.map_err(|e| self.classify(e))?;
        body.into_results(expected)
    }

    async fn run_one(&self, statement: Statement<'_>) -> StoreResult<StatementResult> {
        self.run(vec![statement])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("empty result list".to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else if err.is_decode() {
            StoreError::Malformed(err.to_string())
        } else {
            StoreError::Transport(err)
        }
    }
}

fn commit_endpoint(url: &str, database: &str) -> String {
    format!("{}/db/{}/tx/commit", url.trim_end_matches('/'), database)
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn fetch_nodes(&self) -> StoreResult<Vec<Node>> {
        let result = self.run_one(Statement::new(queries::ALL_NODES)).await?;
        decode::nodes(result)
    }

    async fn fetch_edges(&self) -> StoreResult<Vec<Edge>> {
        let result = self.run_one(Statement::new(queries::ALL_EDGES)).await?;
        decode::edges(result)
    }

    async fn find_nodes(&self, identifier: &str) -> StoreResult<Vec<Node>> {
        let result = self
            .run_one(Statement::new(queries::FIND_NODES).param("identifier", identifier))
            .await?;
        decode::nodes(result)
    }

    async fn upsert_node(&self, node: &NewNode) -> StoreResult<NodeId> {
        let statement = Statement::new(queries::UPSERT_NODE)
            .param("uuid", node.uuid.as_str())
            .param("name", node.name.as_str())
            .param("repo_domain", node.repo_domain.as_str())
            .param("description", node.description.as_str());
        let result = self.run_one(statement).await?;
        decode::first_id(&result)?
            .ok_or_else(|| StoreError::Malformed(format!("upsert of {} returned no id", node.uuid)))
    }

    async fn link_builds_on(&self, uuid: &str, builds_on: &[String]) -> StoreResult<bool> {
        let deps: Vec<Value> = builds_on.iter().map(|d| Value::from(d.as_str())).collect();
        let results = self
            .run(vec![
                Statement::new(queries::NODE_EXISTS).param("uuid", uuid),
                Statement::new(queries::LINK_BUILDS_ON)
                    .param("uuid", uuid)
                    .param("builds_on", deps),
            ])
            .await?;

        let exists = match results.first() {
            Some(result) => decode::first_id(result)?.is_some(),
            None => false,
        };
        if exists {
            tracing::debug!("Linked {} to {} BUILDS_ON targets", uuid, builds_on.len());
        }
        Ok(exists)
    }

    async fn dependency_subgraph(&self, uuid: &str) -> StoreResult<Subgraph> {
        let mut results = self
            .run(vec![
                Statement::new(queries::SUBGRAPH_NODES).param("uuid", uuid),
                Statement::new(queries::SUBGRAPH_EDGES).param("uuid", uuid),
            ])
            .await?
            .into_iter();

        let (Some(nodes), Some(edges)) = (results.next(), results.next()) else {
            return Err(StoreError::Malformed("subgraph query lost a result".to_string()));
        };
        Ok(Subgraph {
            nodes: decode::nodes(nodes)?,
            edges: decode::edges(edges)?,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.run_one(Statement::new(queries::PING)).await.map(|_| ())
    }

    async fn prepare(&self) -> StoreResult<()> {
        self.run_one(Statement::new(queries::UUID_CONSTRAINT))
            .await
            .map(|_| ())
    }

    fn name(&self) -> &str {
        "neo4j"
    }
}
