use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, trace};

use crate::cache::{MarketCache, PriceHistory, TradeWindow};
use crate::engine::book::Orderbook;
use crate::engine::stats;
use crate::engine::types::MarketAnalytics;
use crate::market_data::types::{unix_millis, Market};

/// Everything the engine reads for one market, taken from the cache in one go.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsInputs {
    pub orderbook: Option<Arc<Orderbook>>,
    pub trades: Option<Arc<TradeWindow>>,
    pub price_history: Option<Arc<PriceHistory>>,
}

/// Pure computation of a market's metrics.
///
/// Returns `None` when there is no live order book or one of its sides is empty;
/// a missing trade window or price history only zeroes the dependent figures.
pub fn compute_market_analytics(market: &Market, inputs: &AnalyticsInputs) -> Option<MarketAnalytics> {
    let book = inputs.orderbook.as_deref()?;
    let current_price = book.mid_price()?;
    let spread = book.spread()?;

    let volume = inputs.trades.as_deref().map(TradeWindow::traded_value).unwrap_or(0.0);
    let prices = inputs.price_history.as_deref().map(PriceHistory::prices).unwrap_or(&[]);

    // compared against the oldest sample still inside the window
    let (price_change, price_change_pct) = match prices.first() {
        Some(&oldest) => (
            stats::absolute_change(oldest, current_price),
            stats::percentage_change(oldest, current_price),
        ),
        None => (0.0, 0.0),
    };
    let volatility = stats::standard_deviation(prices);

    Some(MarketAnalytics {
        market_id: market.market_id.clone(),
        symbol: market.symbol(),
        base_denom: market.base_denom.clone(),
        quote_denom: market.quote_denom.clone(),
        current_price,
        volume_24h: volume,
        price_change_24h: price_change,
        price_change_24h_pct: price_change_pct,
        volatility,
        liquidity_score: stats::liquidity_score(volume, spread),
        trending_score: stats::trending_score(volume, volatility, price_change_pct),
        orderbook_depth: book.depth(),
        timestamp_ms: unix_millis(),
        computed_at: Instant::now(),
    })
}

/// Recomputes analytics from cache contents and writes them back.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    cache: Arc<MarketCache>,
}

impl AnalyticsEngine {
    pub fn new(cache: Arc<MarketCache>) -> Self {
        Self { cache }
    }

    #[instrument(level = "debug", skip(self, market), fields(market_id = %market.market_id))]
    pub fn refresh(&self, market: &Market) -> Option<Arc<MarketAnalytics>> {
        let inputs = self.cache.analytics_inputs(&market.market_id);
        let Some(analytics) = compute_market_analytics(market, &inputs) else {
            trace!("No usable order book, skipping");
            return None;
        };
        let analytics = Arc::new(analytics);
        self.cache.set_analytics(&market.market_id, Arc::clone(&analytics));
        Some(analytics)
    }

    /// Refresh every market in turn; returns how many got a new record.
    pub fn refresh_all(&self, markets: &[Market]) -> usize {
        let computed = markets.iter().filter(|m| self.refresh(m).is_some()).count();
        debug!(markets = markets.len(), computed, "Analytics pass finished");
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::book::OrderLevel;
    use crate::market_data::types::Trade;
    use std::time::Duration;

    const EPS: f64 = 1e-9;

    fn market() -> Market {
        Market::new("m1", "inj", "usdt")
    }

    fn book() -> Arc<Orderbook> {
        Arc::new(Orderbook::new(
            vec![OrderLevel::new(10.0, 1.0), OrderLevel::new(9.0, 2.0)],
            vec![OrderLevel::new(11.0, 1.0), OrderLevel::new(12.0, 1.0)],
        ))
    }

    fn trades(values: &[(f64, f64)]) -> Arc<TradeWindow> {
        let trades = values
            .iter()
            .map(|&(price, quantity)| Trade { market_id: "m1".into(), price, quantity, timestamp_ms: 0, is_buy: true })
            .collect();
        Arc::new(TradeWindow::from_trades(trades))
    }

    fn history(prices: &[f64]) -> Arc<PriceHistory> {
        let mut history = PriceHistory::new("m1");
        for (i, p) in prices.iter().enumerate() {
            history.add_price(*p, i as u64);
        }
        Arc::new(history)
    }

    #[test]
    fn test_skipped_without_orderbook() {
        let inputs = AnalyticsInputs { trades: Some(trades(&[(1.0, 1.0)])), ..Default::default() };
        assert!(compute_market_analytics(&market(), &inputs).is_none());
    }

    #[test]
    fn test_skipped_with_one_sided_book() {
        let one_sided = Arc::new(Orderbook::new(vec![OrderLevel::new(10.0, 1.0)], vec![]));
        let inputs = AnalyticsInputs { orderbook: Some(one_sided), ..Default::default() };
        assert!(compute_market_analytics(&market(), &inputs).is_none());
    }

    #[test]
    fn test_book_only_market() {
        let inputs = AnalyticsInputs { orderbook: Some(book()), ..Default::default() };
        let a = compute_market_analytics(&market(), &inputs).unwrap();

        assert_eq!(a.current_price, 10.5);
        assert_eq!(a.volume_24h, 0.0);
        assert_eq!(a.price_change_24h, 0.0);
        assert_eq!(a.price_change_24h_pct, 0.0);
        assert_eq!(a.volatility, 0.0);
        assert_eq!(a.liquidity_score, 0.0);
        assert_eq!(a.trending_score, 0.0);
        assert_eq!(a.symbol, "inj/usdt");
        let depth = a.orderbook_depth.unwrap();
        assert_eq!(depth.spread, 1.0);
        assert_eq!(depth.mid_price, 10.5);
    }

    #[test]
    fn test_full_metrics() {
        let inputs = AnalyticsInputs {
            orderbook: Some(book()),
            trades: Some(trades(&[(10.0, 5.0), (11.0, 4.0)])),
            price_history: Some(history(&[7.0, 10.5, 14.0])),
        };
        let a = compute_market_analytics(&market(), &inputs).unwrap();

        let volume = 50.0 + 44.0;
        assert_eq!(a.volume_24h, volume);
        assert_eq!(a.price_change_24h, 3.5);
        assert!((a.price_change_24h_pct - 50.0).abs() < EPS);
        let volatility = stats::standard_deviation(&[7.0, 10.5, 14.0]);
        assert!((a.volatility - volatility).abs() < EPS);
        assert_eq!(a.liquidity_score, volume / 2.0);
        let trending = 0.4 * (volume + 1.0).log10() + 0.3 * volatility + 0.3 * 50.0;
        assert!((a.trending_score - trending).abs() < EPS);
    }

    #[test]
    fn test_zero_oldest_price_gives_zero_pct() {
        let inputs = AnalyticsInputs {
            orderbook: Some(book()),
            price_history: Some(history(&[0.0, 5.0])),
            ..Default::default()
        };
        let a = compute_market_analytics(&market(), &inputs).unwrap();
        assert_eq!(a.price_change_24h, 10.5);
        assert_eq!(a.price_change_24h_pct, 0.0);
    }

    #[test]
    fn test_engine_writes_back_and_skips_missing_books() {
        let cache = Arc::new(MarketCache::new());
        cache.set_orderbook("m1", (*book()).clone(), Duration::from_secs(5));
        let engine = AnalyticsEngine::new(Arc::clone(&cache));

        let markets = vec![market(), Market::new("m2", "atom", "usdt")];
        assert_eq!(engine.refresh_all(&markets), 1);

        let cached = cache.get_analytics("m1").unwrap();
        assert_eq!(cached.current_price, 10.5);
        assert!(cache.get_analytics("m2").is_none());
    }
}
