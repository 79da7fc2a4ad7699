//! JSON shapes of the Neo4j HTTP transactional endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

#[derive(Debug, Serialize)]
pub struct TxRequest<'a> {
    pub statements: Vec<Statement<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Statement<'a> {
    pub statement: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl<'a> Statement<'a> {
    pub fn new(statement: &'a str) -> Self {
        Statement {
            statement,
            parameters: Map::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<TxError>,
}

impl TxResponse {
    /// Fail on the first reported error, then require one result per
    /// statement sent.
    pub fn into_results(self, expected: usize) -> Result<Vec<StatementResult>, StoreError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(StoreError::Query {
                code: err.code,
                message: err.message,
            });
        }
        if self.results.len() != expected {
            return Err(StoreError::Malformed(format!(
                "expected {expected} statement results, got {}",
                self.results.len()
            )));
        }
        Ok(self.results)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Row>,
}

#[derive(Debug, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub row: Vec<Value>,
    /// Per-column metadata; entity columns carry `{"id", "type", "deleted"}`.
    #[serde(default)]
    pub meta: Vec<Value>,
}

impl Row {
    /// True if any entity in the row is marked deleted.
    pub fn is_tombstoned(&self) -> bool {
        self.meta.iter().any(meta_deleted)
    }
}

fn meta_deleted(meta: &Value) -> bool {
    match meta {
        Value::Object(map) => map.get("deleted").and_then(Value::as_bool).unwrap_or(false),
        Value::Array(items) => items.iter().any(meta_deleted),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct TxError {
    pub code: String,
    pub message: String,
}
