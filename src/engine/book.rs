use serde::Serialize;
use tracing::{instrument, trace};

use crate::engine::stats;
use crate::engine::types::OrderbookDepth;

pub const SHALLOW_DEPTH_LEVELS: usize = 5;
pub const DEEP_DEPTH_LEVELS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderLevel {
    pub price: f64,
    pub quantity: f64,
}

impl OrderLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Aggregated L2 book snapshot as last seen on the venue.
///
/// Levels are kept best-first: `buys` by descending price, `sells` by ascending price.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Orderbook {
    pub buys: Vec<OrderLevel>,
    pub sells: Vec<OrderLevel>,
}

impl Orderbook {
    pub fn new(mut buys: Vec<OrderLevel>, mut sells: Vec<OrderLevel>) -> Self {
        buys.sort_by(|a, b| b.price.total_cmp(&a.price));
        sells.sort_by(|a, b| a.price.total_cmp(&b.price));
        Self { buys, sells }
    }

    pub fn best_bid(&self) -> Option<OrderLevel> {
        self.buys.first().copied()
    }

    pub fn best_ask(&self) -> Option<OrderLevel> {
        self.sells.first().copied()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn spread(&self) -> Option<f64> {
        let (bid, ask) = match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => (bid.price, ask.price),
            _ => {
                trace!(bids = self.buys.len(), asks = self.sells.len(), "One-sided book, no spread");
                return None;
            }
        };
        let spread = ask - bid;
        trace!(best_bid = bid, best_ask = ask, spread = spread, "Calculated spread");
        Some(spread)
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Cumulative notional at 5 and 10 levels per side plus top-of-book figures.
    /// Needs both sides populated.
    #[instrument(level = "trace", skip(self))]
    pub fn depth(&self) -> Option<OrderbookDepth> {
        let spread = self.spread()?;
        let mid_price = self.mid_price()?;

        let depth = OrderbookDepth {
            bid_depth_5: cumulative_notional(&self.buys, SHALLOW_DEPTH_LEVELS),
            ask_depth_5: cumulative_notional(&self.sells, SHALLOW_DEPTH_LEVELS),
            bid_depth_10: cumulative_notional(&self.buys, DEEP_DEPTH_LEVELS),
            ask_depth_10: cumulative_notional(&self.sells, DEEP_DEPTH_LEVELS),
            total_bids: self.buys.len(),
            total_asks: self.sells.len(),
            spread,
            spread_bps: stats::spread_bps(spread, mid_price),
            mid_price,
        };
        trace!(?depth, "Calculated depth");
        Some(depth)
    }

    // Everything resting on both sides, in quote terms
    pub fn total_notional(&self) -> f64 {
        self.buys.iter().chain(self.sells.iter()).map(OrderLevel::notional).sum()
    }
}

fn cumulative_notional(levels: &[OrderLevel], n: usize) -> f64 {
    levels.iter().take(n).map(OrderLevel::notional).sum()
}
