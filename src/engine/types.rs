use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    // Key of this side in the venue's order book payload
    pub fn wire_key(self) -> &'static str {
        match self {
            Side::Buy => "buys",
            Side::Sell => "sells",
        }
    }
}

// Multi-level order book metrics, embedded in MarketAnalytics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderbookDepth {
    pub bid_depth_5: f64,
    pub ask_depth_5: f64,
    pub bid_depth_10: f64,
    pub ask_depth_10: f64,
    pub total_bids: usize,
    pub total_asks: usize,
    pub spread: f64,
    pub spread_bps: f64,
    pub mid_price: f64,
}

/// Derived metrics for one market, computed from a consistent read of the cache.
///
/// `timestamp` is wall-clock milliseconds for clients; freshness is judged on the
/// monotonic `computed_at` so clock adjustments never resurrect stale records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalytics {
    pub market_id: String,
    pub symbol: String,
    pub base_denom: String,
    pub quote_denom: String,
    pub current_price: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub price_change_24h_pct: f64,
    pub volatility: f64,
    pub liquidity_score: f64,
    pub trending_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderbook_depth: Option<OrderbookDepth>,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    #[serde(skip)]
    pub computed_at: Instant,
}

impl MarketAnalytics {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.computed_at)
    }
}

// Entry of a ranking response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingMarket {
    pub market_id: String,
    pub symbol: String,
    pub score: f64,
    pub volume_24h: f64,
    pub volatility: f64,
    pub price_change_pct: f64,
}

// Listing enriched with whatever fresh analytics exist (zeros otherwise)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub base_denom: String,
    pub quote_denom: String,
    pub volume: f64,
    pub price: f64,
    pub volatility: f64,
    pub liquidity_score: f64,
}

// Liquidity of a single book, independent of the trade window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityReport {
    pub market_id: String,
    pub liquidity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderbook_depth: Option<OrderbookDepth>,
}
