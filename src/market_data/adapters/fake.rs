// In-memory source for scheduler and service tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{MarketDataSource, SourceError};

#[derive(Default)]
pub(crate) struct FakeSource {
    pub markets: usize,
    /// Orderbook requests for these ids never answer.
    pub hang: HashSet<String>,
    /// These ids answer with a payload that is not an order book.
    pub malformed: HashSet<String>,
    pub fail_markets: bool,
    pub market_calls: AtomicUsize,
    pub orderbook_calls: Mutex<Vec<String>>,
    pub trade_calls: Mutex<Vec<(String, usize)>>,
}

impl FakeSource {
    pub fn with_markets(markets: usize) -> Self {
        Self { markets, ..Default::default() }
    }

    pub fn market_id(i: usize) -> String {
        format!("m{i}")
    }

    pub fn orderbook_requests(&self) -> Vec<String> {
        self.orderbook_calls.lock().clone()
    }

    pub fn trade_requests(&self) -> Vec<(String, usize)> {
        self.trade_calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch_markets(&self) -> Result<Value, SourceError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_markets {
            return Err(SourceError::Status { url: "fake://markets".into(), status: 502 });
        }
        let markets: Vec<Value> = (0..self.markets)
            .map(|i| json!({"marketId": Self::market_id(i), "baseDenom": format!("b{i}"), "quoteDenom": "usdt"}))
            .collect();
        Ok(json!({ "markets": markets }))
    }

    async fn fetch_orderbook(&self, market_id: &str) -> Result<Value, SourceError> {
        self.orderbook_calls.lock().push(market_id.to_string());
        if self.hang.contains(market_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.malformed.contains(market_id) {
            return Ok(json!({"orderbook": "unavailable"}));
        }
        Ok(json!({"orderbook": {
            "buys": [{"price": "10", "quantity": "1"}, {"price": "9", "quantity": "2"}],
            "sells": [{"price": "11", "quantity": "1"}, {"price": "12", "quantity": "1"}]
        }}))
    }

    async fn fetch_trades(&self, market_id: &str, limit: usize) -> Result<Value, SourceError> {
        self.trade_calls.lock().push((market_id.to_string(), limit));
        Ok(json!({"trades": [
            {"price": "10", "quantity": "2", "tradeDirection": "buy", "executedAt": 1_700_000_000_000u64},
            {"price": "11", "quantity": "1", "tradeDirection": "sell", "executedAt": 1_700_000_001_000u64}
        ]}))
    }
}
