//! Static API-key check for write endpoints

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use stemgraph_core::Error;

use crate::{ServerState, error::ApiError};

/// Header carrying the write token.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Proof that the request presented the configured write token.
///
/// Put it before any body extractor so a bad key is rejected without
/// decoding the payload.
#[derive(Debug)]
pub struct WriteAccess {
    _private: (),
}

#[async_trait]
impl FromRequestParts<Arc<ServerState>> for WriteAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(key) if state.accepts_write_key(key) => Ok(WriteAccess { _private: () }),
            Some(_) => {
                tracing::warn!("Rejected write with invalid API key");
                Err(ApiError(Error::Unauthorized))
            }
            None => {
                tracing::debug!("Rejected write without {} header", API_KEY_HEADER);
                Err(ApiError(Error::Unauthorized))
            }
        }
    }
}

#[cfg(test)]
impl WriteAccess {
    pub(crate) fn granted() -> Self {
        WriteAccess { _private: () }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResolveFrom, TEST_TOKEN, harness};
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<WriteAccess, ApiError> {
        let state = harness(ResolveFrom::Store).state;
        let mut builder = Request::builder().uri("/add_node");
        if let Some(key) = header {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        WriteAccess::from_request_parts(&mut parts, &state).await
    }

    #[tokio::test]
    async fn test_correct_key_is_accepted() {
        assert!(extract(Some(TEST_TOKEN)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_or_wrong_key_is_unauthorized() {
        for header in [None, Some("wrong"), Some("")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
