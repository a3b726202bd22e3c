//! Shared HTTP plumbing for the external collaborators.
//!
//! Generation, lookup, and voice services all speak JSON over POST with a
//! bearer key, a per-request timeout, and a response size cap.

use std::time::Duration;

use reqwest::redirect;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{GenerationError, LookupError, VoiceError};

/// Maximum accepted response body (base64 audio is the largest payload).
pub const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Creates a shared HTTP client.
///
/// No redirect following: collaborator endpoints are fixed by config.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built (TLS backend unavailable).
#[must_use]
pub fn create_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .expect("failed to build HTTP client")
}

/// Transport-level failure of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// Connection or protocol failure
    Network(String),
    /// Non-2xx status
    Status(u16),
    /// Request or body read exceeded the timeout
    Timeout,
    /// Body could not be decoded or was too large
    Decode(String),
}

/// Endpoint settings for one collaborator.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Target URL
    pub url: String,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// POSTs `body` as JSON and decodes the JSON response.
///
/// # Errors
///
/// Returns [`HttpFailure`] on network errors, non-2xx statuses, timeouts,
/// oversized bodies, or undecodable JSON.
pub async fn post_json<B, R>(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    body: &B,
) -> Result<R, HttpFailure>
where
    B: Serialize + Sync,
    R: DeserializeOwned,
{
    debug!(url = %endpoint.url, "calling collaborator");

    let mut req = client.post(&endpoint.url).json(body);
    if let Some(key) = &endpoint.api_key {
        req = req.bearer_auth(key);
    }

    let response = tokio::time::timeout(endpoint.timeout, req.send())
        .await
        .map_err(|_| HttpFailure::Timeout)?
        .map_err(|e| HttpFailure::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HttpFailure::Status(status.as_u16()));
    }

    let bytes = tokio::time::timeout(endpoint.timeout, response.bytes())
        .await
        .map_err(|_| HttpFailure::Timeout)?
        .map_err(|e| HttpFailure::Network(e.to_string()))?;

    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(HttpFailure::Decode(format!(
            "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
        )));
    }

    serde_json::from_slice(&bytes).map_err(|e| HttpFailure::Decode(e.to_string()))
}

impl From<HttpFailure> for GenerationError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Network(msg) => Self::Network(msg),
            HttpFailure::Status(code) => Self::HttpStatus(code),
            HttpFailure::Timeout => Self::Timeout,
            HttpFailure::Decode(msg) => Self::Malformed(msg),
        }
    }
}

impl From<HttpFailure> for LookupError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Network(msg) => Self::Network(msg),
            HttpFailure::Status(code) => Self::HttpStatus(code),
            HttpFailure::Timeout => Self::Timeout,
            HttpFailure::Decode(msg) => Self::Failed(msg),
        }
    }
}

impl From<HttpFailure> for VoiceError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Network(msg) => Self::Network(msg),
            HttpFailure::Status(code) => Self::HttpStatus(code),
            HttpFailure::Timeout => Self::Timeout,
            HttpFailure::Decode(msg) => Self::Failed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mapping() {
        assert_eq!(
            GenerationError::from(HttpFailure::Decode("bad".into())),
            GenerationError::Malformed("bad".into())
        );
        assert_eq!(
            LookupError::from(HttpFailure::Status(429)),
            LookupError::HttpStatus(429)
        );
        assert_eq!(VoiceError::from(HttpFailure::Timeout), VoiceError::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_failure() {
        let client = create_http_client();
        let endpoint = Endpoint {
            // Port 9 (discard) on localhost is closed in test environments.
            url: "http://127.0.0.1:9/generate".to_string(),
            api_key: None,
            timeout: Duration::from_secs(2),
        };
        let result: Result<serde_json::Value, _> =
            post_json(&client, &endpoint, &serde_json::json!({})).await;
        assert!(matches!(
            result,
            Err(HttpFailure::Network(_) | HttpFailure::Timeout)
        ));
    }
}
