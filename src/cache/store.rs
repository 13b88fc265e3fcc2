use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::cache::types::{
    CacheEntry, CacheStats, PriceHistory, SweepReport, TradeWindow, ANALYTICS_EVICT_AFTER, ANALYTICS_MAX_AGE,
};
use crate::engine::analytics::AnalyticsInputs;
use crate::engine::book::Orderbook;
use crate::engine::types::MarketAnalytics;
use crate::market_data::types::{Market, Trade};

/// Process-wide store of the latest market data and derived analytics.
///
/// Every category sits behind its own reader/writer lock. When more than one lock
/// is held they are taken in declaration order (markets, orderbooks, trades,
/// price_history, analytics). Values are handed out as `Arc`s, so a reader always
/// sees a complete record and writers either replace it or copy-on-write.
#[derive(Debug, Default)]
pub struct MarketCache {
    markets: RwLock<Option<CacheEntry<Vec<Market>>>>,
    orderbooks: RwLock<AHashMap<String, CacheEntry<Orderbook>>>,
    trades: RwLock<AHashMap<String, Arc<TradeWindow>>>,
    price_history: RwLock<AHashMap<String, Arc<PriceHistory>>>,
    analytics: RwLock<AHashMap<String, Arc<MarketAnalytics>>>,
    // bumped by every mutation, lets callers detect writes
    generation: AtomicU64,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_markets(&self, markets: Vec<Market>, ttl: Duration) {
        let entry = CacheEntry::new(markets, ttl, Instant::now());
        *self.markets.write() = Some(entry);
        self.bump();
    }

    pub fn get_markets(&self) -> Option<Arc<Vec<Market>>> {
        let now = Instant::now();
        self.markets
            .read()
            .as_ref()
            .filter(|entry| !entry.is_expired(now))
            .map(CacheEntry::data)
    }

    pub fn set_orderbook(&self, market_id: &str, book: Orderbook, ttl: Duration) {
        let entry = CacheEntry::new(book, ttl, Instant::now());
        self.orderbooks.write().insert(market_id.to_string(), entry);
        self.bump();
    }

    pub fn get_orderbook(&self, market_id: &str) -> Option<Arc<Orderbook>> {
        let now = Instant::now();
        self.orderbooks
            .read()
            .get(market_id)
            .filter(|entry| !entry.is_expired(now))
            .map(CacheEntry::data)
    }

    /// Replace the trade window of a market wholesale.
    pub fn set_trades(&self, market_id: &str, trades: Vec<Trade>) {
        let window = Arc::new(TradeWindow::from_trades(trades));
        self.trades.write().insert(market_id.to_string(), window);
        self.bump();
    }

    pub fn append_trade(&self, market_id: &str, trade: Trade) {
        {
            let mut trades = self.trades.write();
            let window = trades.entry(market_id.to_string()).or_default();
            Arc::make_mut(window).push(trade);
        }
        self.bump();
    }

    pub fn get_trades(&self, market_id: &str) -> Option<Arc<TradeWindow>> {
        self.trades.read().get(market_id).cloned()
    }

    pub fn set_price_history(&self, market_id: &str, history: PriceHistory) {
        self.price_history.write().insert(market_id.to_string(), Arc::new(history));
        self.bump();
    }

    pub fn get_price_history(&self, market_id: &str) -> Option<Arc<PriceHistory>> {
        self.price_history.read().get(market_id).cloned()
    }

    /// Append one sample, creating the history on first use.
    pub fn append_price(&self, market_id: &str, price: f64, timestamp_ms: u64) {
        {
            let mut histories = self.price_history.write();
            let history = histories
                .entry(market_id.to_string())
                .or_insert_with(|| Arc::new(PriceHistory::new(market_id)));
            Arc::make_mut(history).add_price(price, timestamp_ms);
        }
        self.bump();
    }

    pub fn set_analytics(&self, market_id: &str, analytics: Arc<MarketAnalytics>) {
        self.analytics.write().insert(market_id.to_string(), analytics);
        self.bump();
    }

    /// Cached analytics, provided they are still within `ANALYTICS_MAX_AGE`.
    pub fn get_analytics(&self, market_id: &str) -> Option<Arc<MarketAnalytics>> {
        let now = Instant::now();
        self.analytics
            .read()
            .get(market_id)
            .filter(|a| a.age(now) <= ANALYTICS_MAX_AGE)
            .cloned()
    }

    pub fn get_all_analytics(&self) -> Vec<Arc<MarketAnalytics>> {
        let now = Instant::now();
        self.analytics
            .read()
            .values()
            .filter(|a| a.age(now) <= ANALYTICS_MAX_AGE)
            .cloned()
            .collect()
    }

    /// Order book, trade window and price history of a market, read under all
    /// three category locks at once.
    pub fn analytics_inputs(&self, market_id: &str) -> AnalyticsInputs {
        let now = Instant::now();
        let orderbooks = self.orderbooks.read();
        let trades = self.trades.read();
        let histories = self.price_history.read();

        AnalyticsInputs {
            orderbook: orderbooks
                .get(market_id)
                .filter(|entry| !entry.is_expired(now))
                .map(CacheEntry::data),
            trades: trades.get(market_id).cloned(),
            price_history: histories.get(market_id).cloned(),
        }
    }

    /// Drop expired markets/order books and analytics past `ANALYTICS_EVICT_AFTER`.
    #[instrument(level = "debug", skip(self))]
    pub fn clean_expired(&self) -> SweepReport {
        let now = Instant::now();
        let mut report = SweepReport::default();

        {
            let mut markets = self.markets.write();
            if markets.as_ref().is_some_and(|entry| entry.is_expired(now)) {
                *markets = None;
                report.markets = 1;
            }
        }
        {
            let mut orderbooks = self.orderbooks.write();
            let before = orderbooks.len();
            orderbooks.retain(|_, entry| !entry.is_expired(now));
            report.orderbooks = before - orderbooks.len();
        }
        {
            let mut analytics = self.analytics.write();
            let before = analytics.len();
            analytics.retain(|_, a| a.age(now) <= ANALYTICS_EVICT_AFTER);
            report.analytics = before - analytics.len();
        }

        if report.total() > 0 {
            self.bump();
        }
        debug!(?report, "Swept cache");
        report
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            has_markets: self.markets.read().is_some(),
            orderbooks: self.orderbooks.read().len(),
            trade_windows: self.trades.read().len(),
            price_histories: self.price_history.read().len(),
            analytics: self.analytics.read().len(),
        }
    }

    /// Number of mutations applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
