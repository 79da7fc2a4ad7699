//! Error kinds surfaced by API operations.
//!
//! Each variant maps onto one HTTP status class; the mapping itself lives in
//! the server crate so this crate stays free of transport concerns.
//! Cycles in the `BUILDS_ON` relation are not errors and never show up here.

use thiserror::Error;

/// Result type for STEMgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Identifier, UUID or name does not resolve to a node
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or incorrect write credential
    #[error("invalid API key - access denied")]
    Unauthorized,

    /// The graph store did not answer, or answered with something unusable
    #[error("graph store unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Malformed request payload
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
