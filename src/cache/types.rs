use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::market_data::types::Trade;

pub const TRADE_WINDOW_CAPACITY: usize = 1000;
pub const PRICE_HISTORY_CAPACITY: usize = 100;

/// Analytics older than this are not served, swept or not.
pub const ANALYTICS_MAX_AGE: Duration = Duration::from_secs(15);
/// Analytics older than this are removed by the sweep.
pub const ANALYTICS_EVICT_AFTER: Duration = Duration::from_secs(60);

// Value with a fixed expiry instant; `None` when the TTL runs past what
// `Instant` can represent
#[derive(Debug)]
pub struct CacheEntry<T> {
    data: Arc<T>,
    expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration, now: Instant) -> Self {
        Self { data: Arc::new(data), expires_at: now.checked_add(ttl) }
    }

    pub fn data(&self) -> Arc<T> {
        Arc::clone(&self.data)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Most recent trades of a market, oldest first, capped at `TRADE_WINDOW_CAPACITY`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeWindow {
    trades: VecDeque<Trade>,
}

impl TradeWindow {
    pub fn from_trades(trades: Vec<Trade>) -> Self {
        let mut trades = VecDeque::from(trades);
        let excess = trades.len().saturating_sub(TRADE_WINDOW_CAPACITY);
        trades.drain(..excess);
        Self { trades }
    }

    pub fn push(&mut self, trade: Trade) {
        if self.trades.len() == TRADE_WINDOW_CAPACITY {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// Sum of price * quantity over the window. Only as wide as the window,
    /// not a trailing 24h figure.
    pub fn traded_value(&self) -> f64 {
        self.trades.iter().map(Trade::notional).sum()
    }
}

/// Rolling window of sampled prices with their wall-clock timestamps (ms).
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub market_id: String,
    prices: Vec<f64>,
    times: Vec<u64>,
    max_size: usize,
}

impl PriceHistory {
    pub fn new(market_id: &str) -> Self {
        Self::with_capacity(market_id, PRICE_HISTORY_CAPACITY)
    }

    pub fn with_capacity(market_id: &str, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            market_id: market_id.to_string(),
            prices: Vec::with_capacity(max_size),
            times: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add_price(&mut self, price: f64, timestamp_ms: u64) {
        self.prices.push(price);
        self.times.push(timestamp_ms);

        let excess = self.prices.len().saturating_sub(self.max_size);
        if excess > 0 {
            self.prices.drain(..excess);
            self.times.drain(..excess);
        }
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.times
    }

    pub fn oldest_price(&self) -> Option<f64> {
        self.prices.first().copied()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

// Entries removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub markets: usize,
    pub orderbooks: usize,
    pub analytics: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.markets + self.orderbooks + self.analytics
    }
}

// Entry counts per category, including not-yet-swept stale entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub has_markets: bool,
    pub orderbooks: usize,
    pub trade_windows: usize,
    pub price_histories: usize,
    pub analytics: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trade(i: usize) -> Trade {
        Trade { market_id: "m".into(), price: i as f64, quantity: 1.0, timestamp_ms: i as u64, is_buy: i % 2 == 0 }
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let t0 = Instant::now();
        let entry = CacheEntry::new(1u8, Duration::from_secs(10), t0);
        assert!(!entry.is_expired(t0 + Duration::from_millis(9_999)));
        assert!(!entry.is_expired(t0 + Duration::from_secs(10)));
        assert!(entry.is_expired(t0 + Duration::from_millis(10_001)));
    }

    #[test]
    fn test_entry_zero_and_unrepresentable_ttl() {
        let t0 = Instant::now();
        let zero = CacheEntry::new(1u8, Duration::ZERO, t0);
        assert!(!zero.is_expired(t0));
        assert!(zero.is_expired(t0 + Duration::from_nanos(1)));

        let forever = CacheEntry::new(1u8, Duration::MAX, t0);
        assert!(!forever.is_expired(t0 + Duration::from_secs(365 * 24 * 3600)));
    }

    #[test]
    fn test_trade_window_drops_oldest() {
        let mut window = TradeWindow::default();
        for i in 0..=TRADE_WINDOW_CAPACITY {
            window.push(trade(i));
        }
        assert_eq!(window.len(), TRADE_WINDOW_CAPACITY);
        assert_eq!(window.iter().next().unwrap().price, 1.0);
        assert!(window.iter().all(|t| t.price != 0.0));
    }

    #[test]
    fn test_trade_window_from_oversized_batch() {
        let trades = (0..1500).map(trade).collect();
        let window = TradeWindow::from_trades(trades);
        assert_eq!(window.len(), TRADE_WINDOW_CAPACITY);
        assert_eq!(window.iter().next().unwrap().price, 500.0);
        assert_eq!(window.iter().last().unwrap().price, 1499.0);
    }

    #[test]
    fn test_traded_value() {
        let window = TradeWindow::from_trades(vec![trade(2), trade(3)]);
        assert_eq!(window.traded_value(), 5.0);
        assert_eq!(TradeWindow::default().traded_value(), 0.0);
    }

    #[test]
    fn test_price_history_keeps_most_recent_hundred() {
        let mut history = PriceHistory::new("m");
        for i in 0..101 {
            history.add_price(i as f64, i as u64);
        }
        assert_eq!(history.len(), PRICE_HISTORY_CAPACITY);
        let expected: Vec<f64> = (1..101).map(|i| i as f64).collect();
        assert_eq!(history.prices(), expected.as_slice());
        assert_eq!(history.timestamps().first(), Some(&1));
        assert_eq!(history.latest_price(), Some(100.0));
        assert_eq!(history.oldest_price(), Some(1.0));
    }

    #[test]
    fn test_empty_price_history() {
        let history = PriceHistory::new("m");
        assert!(history.is_empty());
        assert_eq!(history.latest_price(), None);
        assert_eq!(history.oldest_price(), None);
    }

    proptest! {
        #[test]
        fn prop_trade_window_never_exceeds_capacity(initial in 0usize..1200, appended in 0usize..1200) {
            let mut window = TradeWindow::from_trades((0..initial).map(trade).collect());
            for i in 0..appended {
                window.push(trade(initial + i));
                prop_assert!(window.len() <= TRADE_WINDOW_CAPACITY);
            }
            let total = initial + appended;
            prop_assert_eq!(window.len(), total.min(TRADE_WINDOW_CAPACITY));
            if total > 0 {
                prop_assert_eq!(window.iter().last().unwrap().price, (total - 1) as f64);
            }
        }

        #[test]
        fn prop_price_history_is_a_fifo_suffix(prices in proptest::collection::vec(-1e6f64..1e6, 0..300), cap in 1usize..150) {
            let mut history = PriceHistory::with_capacity("m", cap);
            for (i, p) in prices.iter().enumerate() {
                history.add_price(*p, i as u64);
            }
            let keep = prices.len().min(cap);
            prop_assert_eq!(history.prices(), &prices[prices.len() - keep..]);
            prop_assert_eq!(history.prices().len(), history.timestamps().len());
            prop_assert_eq!(history.latest_price(), prices.last().copied());
        }
    }
}
