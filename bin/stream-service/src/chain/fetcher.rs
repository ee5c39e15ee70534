//! Content metadata retrieval from IPFS gateways

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::resilience::{is_transient_message, Retryable};
use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug)]
pub enum FetchError {
    /// Gateway answered with a non-success status
    GatewayStatus { cid: String, status: u16 },
    /// Request never completed (DNS, connect, timeout)
    Transport(String),
    /// Gateway body was not the JSON metadata document we expect
    InvalidMetadata { cid: String, reason: String },
    ContentNotFound { cid: String },
    /// Breaker is open after repeated gateway failures
    CircuitOpen { retry_in_ms: u64 },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::GatewayStatus { cid, status } => {
                write!(f, "IPFS fetch for {} failed with status: {}", cid, status)
            }
            FetchError::Transport(msg) => write!(f, "IPFS transport error: {}", msg),
            FetchError::InvalidMetadata { cid, reason } => {
                write!(f, "Invalid metadata for {}: {}", cid, reason)
            }
            FetchError::ContentNotFound { cid } => write!(f, "Content not found: {}", cid),
            FetchError::CircuitOpen { retry_in_ms } => {
                write!(f, "IPFS circuit breaker open, retry in {}ms", retry_in_ms)
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::GatewayStatus { status, .. } => {
                *status == 429 || (500..=599).contains(status)
            }
            FetchError::Transport(msg) => is_transient_message(msg),
            _ => false,
        }
    }

    fn circuit_open(retry_in_ms: u64) -> Self {
        FetchError::CircuitOpen { retry_in_ms }
    }
}

/// Resolves a content identifier to its metadata document.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, cid: &str) -> Result<Value, FetchError>;
}

/// Fetches metadata through an HTTP gateway, `{gateway}{cid}`.
pub struct HttpGatewayFetcher {
    gateway: String,
    client: reqwest::Client,
}

impl HttpGatewayFetcher {
    pub fn new(gateway: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        Ok(Self {
            gateway: gateway.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpGatewayFetcher {
    async fn fetch(&self, cid: &str) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.gateway, cid);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::ContentNotFound {
                cid: cid.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::GatewayStatus {
                cid: cid.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|err| FetchError::InvalidMetadata {
                cid: cid.to_string(),
                reason: err.to_string(),
            })
    }
}

/// Serves canned metadata without touching the network. Used by offline mode
/// and tests.
#[derive(Default)]
pub struct FixtureFetcher {
    fixtures: RwLock<HashMap<String, Value>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cid: &str, metadata: Value) {
        self.fixtures.write().insert(cid.to_string(), metadata);
    }
}

#[async_trait]
impl ContentFetcher for FixtureFetcher {
    async fn fetch(&self, cid: &str) -> Result<Value, FetchError> {
        self.fixtures
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| FetchError::ContentNotFound {
                cid: cid.to_string(),
            })
    }
}

pub enum AnyFetcher {
    Gateway(HttpGatewayFetcher),
    Fixture(FixtureFetcher),
}

#[async_trait]
impl ContentFetcher for AnyFetcher {
    async fn fetch(&self, cid: &str) -> Result<Value, FetchError> {
        match self {
            AnyFetcher::Gateway(fetcher) => fetcher.fetch(cid).await,
            AnyFetcher::Fixture(fetcher) => fetcher.fetch(cid).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fixture_fetcher_round_trip() {
        let fetcher = FixtureFetcher::new();
        fetcher.insert("QmTest", json!({ "title": "Demo reel", "duration": 90 }));

        let metadata = fetcher.fetch("QmTest").await.unwrap();
        assert_eq!(metadata["title"], "Demo reel");

        let err = fetcher.fetch("QmMissing").await.unwrap_err();
        assert!(matches!(err, FetchError::ContentNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        let transient = FetchError::GatewayStatus {
            cid: "QmX".into(),
            status: 503,
        };
        assert!(transient.is_retryable());

        let throttled = FetchError::GatewayStatus {
            cid: "QmX".into(),
            status: 429,
        };
        assert!(throttled.is_retryable());

        let timeout = FetchError::Transport("operation timed out".into());
        assert!(timeout.is_retryable());

        let bad_body = FetchError::InvalidMetadata {
            cid: "QmX".into(),
            reason: "expected value at line 1".into(),
        };
        assert!(!bad_body.is_retryable());
    }
}
