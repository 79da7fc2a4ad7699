//! Core data structures for the STEMgraph read model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Label given to every node created through the API.
pub const CHALLENGE_LABEL: &str = "Challenge";

/// Store-assigned node identifier. Never chosen by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Client-visible identifier, unique across all nodes.
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// Where the node's material lives (repository host or link).
    #[serde(default)]
    pub repo_domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Created implicitly by a `BUILDS_ON` link, not yet upserted in full.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// What kind of relationship an edge represents.
///
/// Only [`EdgeKind::BuildsOn`] takes part in dependency resolution; any other
/// relationship type found in the store is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    BuildsOn,
    Other(String),
}

impl EdgeKind {
    pub const BUILDS_ON: &'static str = "BUILDS_ON";

    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::BuildsOn => Self::BUILDS_ON,
            EdgeKind::Other(name) => name,
        }
    }
}

impl From<String> for EdgeKind {
    fn from(name: String) -> Self {
        if name == Self::BUILDS_ON {
            EdgeKind::BuildsOn
        } else {
            EdgeKind::Other(name)
        }
    }
}

impl From<&str> for EdgeKind {
    fn from(name: &str) -> Self {
        EdgeKind::from(name.to_string())
    }
}

impl From<EdgeKind> for String {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::BuildsOn => EdgeKind::BUILDS_ON.to_string(),
            EdgeKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two store identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn builds_on(from: NodeId, to: NodeId) -> Self {
        Edge {
            from,
            to,
            kind: EdgeKind::BuildsOn,
        }
    }

    pub fn is_builds_on(&self) -> bool {
        self.kind == EdgeKind::BuildsOn
    }
}

/// Client-submitted node, as accepted by `POST /add_node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNode {
    pub name: String,
    pub uuid: String,
    pub repo_domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub builds_on: Vec<String>,
}

impl NewNode {
    /// Reject drafts the store would accept but the graph should never hold.
    pub fn validate(&self) -> Result<(), Error> {
        if self.uuid.trim().is_empty() {
            return Err(Error::Validation("uuid must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if let Some(blank) = self.builds_on.iter().find(|dep| dep.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "builds_on contains an empty uuid ({blank:?})"
            )));
        }
        if self.builds_on.iter().any(|dep| dep == &self.uuid) {
            return Err(Error::Validation(format!(
                "node {} cannot build on itself",
                self.uuid
            )));
        }
        Ok(())
    }

    /// Dependency UUIDs with duplicates removed, first occurrence kept.
    pub fn dependencies(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.builds_on
            .iter()
            .filter(|dep| seen.insert(dep.as_str()))
            .cloned()
            .collect()
    }
}
