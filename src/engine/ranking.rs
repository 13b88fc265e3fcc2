use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;

use crate::cache::MarketCache;
use crate::engine::types::{MarketAnalytics, TrendingMarket};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RankMetric {
    Volume,
    Volatility,
    #[default]
    Trending,
    PriceChange,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ranking metric `{0}` (expected volume, volatility, trending or price_change)")]
pub struct UnknownMetric(pub String);

impl RankMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            RankMetric::Volume => "volume",
            RankMetric::Volatility => "volatility",
            RankMetric::Trending => "trending",
            RankMetric::PriceChange => "price_change",
        }
    }

    pub fn value_of(self, analytics: &MarketAnalytics) -> f64 {
        match self {
            RankMetric::Volume => analytics.volume_24h,
            RankMetric::Volatility => analytics.volatility,
            RankMetric::Trending => analytics.trending_score,
            RankMetric::PriceChange => analytics.price_change_24h_pct,
        }
    }
}

impl FromStr for RankMetric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volume" => Ok(RankMetric::Volume),
            "volatility" => Ok(RankMetric::Volatility),
            "trending" | "" => Ok(RankMetric::Trending),
            "price_change" => Ok(RankMetric::PriceChange),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a caller-supplied result count: missing or zero falls back to
/// `DEFAULT_LIMIT`, anything above `MAX_LIMIT` is capped.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_LIMIT,
        Some(n) => n.min(MAX_LIMIT),
    }
}

/// Fresh analytics sorted by `metric`, highest first, at most `limit` entries.
/// Ties come back in no particular order.
pub fn top_markets(cache: &MarketCache, metric: RankMetric, limit: usize) -> Vec<Arc<MarketAnalytics>> {
    cache
        .get_all_analytics()
        .into_iter()
        .sorted_unstable_by(|a, b| metric.value_of(b).total_cmp(&metric.value_of(a)))
        .take(limit)
        .collect()
}

pub fn trending_markets(cache: &MarketCache, metric: RankMetric, limit: usize) -> Vec<TrendingMarket> {
    top_markets(cache, metric, limit)
        .iter()
        .map(|a| TrendingMarket {
            market_id: a.market_id.clone(),
            symbol: a.symbol.clone(),
            score: metric.value_of(a),
            volume_24h: a.volume_24h,
            volatility: a.volatility,
            price_change_pct: a.price_change_24h_pct,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::unix_millis;
    use std::time::{Duration, Instant};

    fn analytics(id: &str, volume: f64, volatility: f64, pct: f64, trending: f64) -> Arc<MarketAnalytics> {
        Arc::new(MarketAnalytics {
            market_id: id.into(),
            symbol: format!("{id}/usdt"),
            base_denom: id.into(),
            quote_denom: "usdt".into(),
            current_price: 1.0,
            volume_24h: volume,
            price_change_24h: 0.0,
            price_change_24h_pct: pct,
            volatility,
            liquidity_score: 0.0,
            trending_score: trending,
            orderbook_depth: None,
            timestamp_ms: unix_millis(),
            computed_at: Instant::now(),
        })
    }

    fn seeded_cache() -> MarketCache {
        let cache = MarketCache::new();
        cache.set_analytics("a", analytics("a", 100.0, 3.0, -20.0, 2.0));
        cache.set_analytics("b", analytics("b", 50.0, 1.0, 5.0, 9.0));
        cache.set_analytics("c", analytics("c", 200.0, 2.0, 1.0, 4.0));
        cache
    }

    fn ids(ranked: &[Arc<MarketAnalytics>]) -> Vec<&str> {
        ranked.iter().map(|a| a.market_id.as_str()).collect()
    }

    #[test]
    fn test_top_by_volume() {
        let cache = seeded_cache();
        let ranked = top_markets(&cache, RankMetric::Volume, 2);
        assert_eq!(ids(&ranked), vec!["c", "a"]);
    }

    #[test]
    fn test_top_by_other_metrics() {
        let cache = seeded_cache();
        assert_eq!(ids(&top_markets(&cache, RankMetric::Volatility, 3)), vec!["a", "c", "b"]);
        assert_eq!(ids(&top_markets(&cache, RankMetric::Trending, 3)), vec!["b", "c", "a"]);
        assert_eq!(ids(&top_markets(&cache, RankMetric::PriceChange, 3)), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_limit_larger_than_population_and_zero() {
        let cache = seeded_cache();
        assert_eq!(top_markets(&cache, RankMetric::default(), 50).len(), 3);
        assert!(top_markets(&cache, RankMetric::default(), 0).is_empty());
    }

    #[test]
    fn test_stale_entries_excluded() {
        let cache = seeded_cache();
        let mut stale = (*analytics("d", 1e9, 0.0, 0.0, 0.0)).clone();
        stale.computed_at = Instant::now().checked_sub(Duration::from_secs(20)).unwrap();
        cache.set_analytics("d", Arc::new(stale));

        let ranked = top_markets(&cache, RankMetric::Volume, 10);
        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_trending_projection_uses_selected_metric() {
        let cache = seeded_cache();
        let trending = trending_markets(&cache, RankMetric::Volume, 1);
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].market_id, "c");
        assert_eq!(trending[0].symbol, "c/usdt");
        assert_eq!(trending[0].score, 200.0);
        assert_eq!(trending[0].price_change_pct, 1.0);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("volume".parse::<RankMetric>(), Ok(RankMetric::Volume));
        assert_eq!(" Price_Change ".parse::<RankMetric>(), Ok(RankMetric::PriceChange));
        assert_eq!("".parse::<RankMetric>(), Ok(RankMetric::Trending));
        assert!("liquidity".parse::<RankMetric>().is_err());
        assert_eq!(RankMetric::default().to_string(), "trending");
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 10);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(500)), 50);
    }
}
