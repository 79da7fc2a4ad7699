//! Errors raised while talking to the graph store.

use stemgraph_core::Error;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection refused, reset, TLS failure and the like
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store did not answer within the configured timeout
    #[error("graph store timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Non-success HTTP status from the transaction endpoint
    #[error("graph store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The transaction endpoint reported a statement error
    #[error("query failed ({code}): {message}")]
    Query { code: String, message: String },

    /// The response did not have the expected shape
    #[error("malformed store response: {0}")]
    Malformed(String),

    /// The backend is switched off (in-memory store outage simulation)
    #[error("graph store unavailable")]
    Unavailable,
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::UpstreamUnavailable(err.to_string())
    }
}
