// Injective exchange REST adapter (spot markets)

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{MarketDataSource, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://sentry.exchange.grpc-web.injective.network:443";

const MARKETS_PATH: &str = "/api/exchange/spot/v1/markets";
const ORDERBOOK_PATH: &str = "/api/exchange/spot/v2/orderbook";
const TRADES_PATH: &str = "/api/exchange/spot/v2/trades";

pub struct InjectiveClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl InjectiveClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|source| SourceError::Http { url: base_url.clone(), source })?;
        Ok(Self { http, base_url, timeout })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn markets_url(&self) -> String {
        format!("{}{MARKETS_PATH}", self.base_url)
    }

    fn orderbook_url(&self, market_id: &str) -> String {
        format!("{}{ORDERBOOK_PATH}/{market_id}", self.base_url)
    }

    fn trades_url(&self, market_id: &str, limit: usize) -> String {
        format!("{}{TRADES_PATH}?marketIds={market_id}&limit={limit}", self.base_url)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_json(&self, url: String) -> Result<Value, SourceError> {
        let response = self.http.get(&url).send().await.map_err(|source| {
            if source.is_timeout() {
                SourceError::Timeout(self.timeout)
            } else {
                SourceError::Http { url: url.clone(), source }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url, status: status.as_u16() });
        }
        debug!(%status, "Upstream responded");

        response.json::<Value>().await.map_err(|source| SourceError::Decode { url, source })
    }
}

#[async_trait::async_trait]
impl MarketDataSource for InjectiveClient {
    async fn fetch_markets(&self) -> Result<Value, SourceError> {
        self.get_json(self.markets_url()).await
    }

    async fn fetch_orderbook(&self, market_id: &str) -> Result<Value, SourceError> {
        self.get_json(self.orderbook_url(market_id)).await
    }

    async fn fetch_trades(&self, market_id: &str, limit: usize) -> Result<Value, SourceError> {
        self.get_json(self.trades_url(market_id, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let client = InjectiveClient::new("https://example.org:443/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://example.org:443");
        assert_eq!(client.markets_url(), "https://example.org:443/api/exchange/spot/v1/markets");
        assert_eq!(client.orderbook_url("0xabc"), "https://example.org:443/api/exchange/spot/v2/orderbook/0xabc");
        assert_eq!(
            client.trades_url("0xabc", 100),
            "https://example.org:443/api/exchange/spot/v2/trades?marketIds=0xabc&limit=100"
        );
    }
}
