//! Turn transaction-endpoint rows into read-model nodes and edges

use serde_json::Value;
use stemgraph_core::{Edge, EdgeKind, Node, NodeId};

use super::wire::{Row, StatementResult};
use crate::error::StoreError;

/// Decode `[id, node, labels]` rows, skipping tombstones and uuid-less nodes.
pub fn nodes(result: StatementResult) -> Result<Vec<Node>, StoreError> {
    let mut nodes = Vec::with_capacity(result.data.len());
    let mut skipped = 0usize;

    for row in result.data {
        if row.is_tombstoned() {
            skipped += 1;
            continue;
        }
        match node(&row)? {
            Some(node) => nodes.push(node),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} deleted or uuid-less node rows", skipped);
    }
    Ok(nodes)
}

/// Decode `[from, type, to, ..]` rows, skipping tombstones.
pub fn edges(result: StatementResult) -> Result<Vec<Edge>, StoreError> {
    result
        .data
        .iter()
        .filter(|row| !row.is_tombstoned())
        .map(edge)
        .collect()
}

/// First column of the first row as a store id, if any row came back.
pub fn first_id(result: &StatementResult) -> Result<Option<NodeId>, StoreError> {
    match result.data.first() {
        Some(row) => id_at(row, 0).map(Some),
        None => Ok(None),
    }
}

fn node(row: &Row) -> Result<Option<Node>, StoreError> {
    let id = id_at(row, 0)?;
    let props = match row.row.get(1) {
        Some(Value::Object(props)) => props,
        other => {
            return Err(StoreError::Malformed(format!(
                "node {id}: expected property map, got {other:?}"
            )));
        }
    };

    let Some(uuid) = props.get("uuid").and_then(Value::as_str) else {
        tracing::debug!("Node {} has no uuid property", id);
        return Ok(None);
    };

    let text = |key: &str| {
        props
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let labels = match row.row.get(2) {
        Some(Value::Array(labels)) => labels
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Some(Node {
        id,
        uuid: uuid.to_string(),
        name: text("name"),
        repo_domain: text("repo_domain"),
        description: text("description"),
        labels,
        placeholder: props
            .get("placeholder")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }))
}

fn edge(row: &Row) -> Result<Edge, StoreError> {
    let from = id_at(row, 0)?;
    let kind = row
        .row
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed(format!("edge from {from}: missing type")))?;
    let to = id_at(row, 2)?;
    Ok(Edge {
        from,
        to,
        kind: EdgeKind::from(kind),
    })
}

fn id_at(row: &Row, column: usize) -> Result<NodeId, StoreError> {
    row.row
        .get(column)
        .and_then(Value::as_i64)
        .map(NodeId)
        .ok_or_else(|| {
            StoreError::Malformed(format!(
                "column {column}: expected integer id, got {:?}",
                row.row.get(column)
            ))
        })
}
