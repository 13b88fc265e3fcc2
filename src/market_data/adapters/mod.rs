// Shared trait + error for upstream market data sources

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Raw access to a venue. Payloads are returned as decoded JSON and turned
/// into typed records by `normaliser`.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_markets(&self) -> Result<Value, SourceError>;

    async fn fetch_orderbook(&self, market_id: &str) -> Result<Value, SourceError>;

    async fn fetch_trades(&self, market_id: &str, limit: usize) -> Result<Value, SourceError>;
}

/// Bound a single upstream call; an elapsed deadline becomes `SourceError::Timeout`.
pub async fn with_timeout<F>(limit: Duration, call: F) -> Result<Value, SourceError>
where
    F: Future<Output = Result<Value, SourceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(limit)),
    }
}

pub mod injective;

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok(Value::Bool(true)) }).await;
        assert_eq!(value.unwrap(), Value::Bool(true));

        let status = with_timeout(Duration::from_secs(1), async {
            Err(SourceError::Status { url: "u".into(), status: 503 })
        })
        .await;
        assert!(matches!(status, Err(SourceError::Status { status: 503, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let limit = Duration::from_millis(50);
        let result = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        })
        .await;
        match result {
            Err(SourceError::Timeout(d)) => assert_eq!(d, limit),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
