// Read-side entry point for the surrounding service.
// Reads come from the cache; a miss falls back to the source and writes the
// result back with the same TTLs the collector uses.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cache::MarketCache;
use crate::engine::analytics::AnalyticsEngine;
use crate::engine::book::Orderbook;
use crate::engine::ranking::{self, RankMetric};
use crate::engine::types::{LiquidityReport, MarketAnalytics, MarketSummary, TrendingMarket};
use crate::market_data::adapters::{with_timeout, MarketDataSource, SourceError};
use crate::market_data::collector::CollectorConfig;
use crate::market_data::normaliser::{self, ParseError};
use crate::market_data::types::Market;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Fetch(#[from] SourceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown market `{0}`")]
    UnknownMarket(String),
}

pub struct MarketService {
    cache: Arc<MarketCache>,
    source: Arc<dyn MarketDataSource>,
    engine: AnalyticsEngine,
    config: CollectorConfig,
}

impl MarketService {
    pub fn new(cache: Arc<MarketCache>, source: Arc<dyn MarketDataSource>, config: CollectorConfig) -> Self {
        Self {
            engine: AnalyticsEngine::new(Arc::clone(&cache)),
            cache,
            source,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<MarketCache> {
        &self.cache
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn markets(&self) -> Result<Arc<Vec<Market>>, ServiceError> {
        if let Some(markets) = self.cache.get_markets() {
            return Ok(markets);
        }
        debug!("Market list not cached, fetching");
        let payload = with_timeout(self.config.request_timeout, self.source.fetch_markets()).await?;
        let markets = Arc::new(normaliser::parse_markets(&payload)?);
        self.cache.set_markets(markets.as_ref().clone(), self.config.markets_ttl);
        Ok(markets)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn orderbook(&self, market_id: &str) -> Result<Arc<Orderbook>, ServiceError> {
        if let Some(book) = self.cache.get_orderbook(market_id) {
            return Ok(book);
        }
        debug!("Order book not cached, fetching");
        let call = self.source.fetch_orderbook(market_id);
        let payload = with_timeout(self.config.request_timeout, call).await?;
        let book = normaliser::parse_orderbook(&payload)?;
        self.cache.set_orderbook(market_id, book.clone(), self.config.orderbook_ttl);
        Ok(Arc::new(book))
    }

    /// Fresh analytics for a listed market, computed on demand when the cached
    /// record is missing or stale. `None` when the market has no two-sided book.
    #[instrument(level = "debug", skip(self))]
    pub async fn analytics(&self, market_id: &str) -> Result<Option<Arc<MarketAnalytics>>, ServiceError> {
        if let Some(analytics) = self.cache.get_analytics(market_id) {
            return Ok(Some(analytics));
        }

        let markets = self.markets().await?;
        let market = markets
            .iter()
            .find(|m| m.market_id == market_id)
            .ok_or_else(|| ServiceError::UnknownMarket(market_id.to_string()))?;

        self.orderbook(market_id).await?;
        Ok(self.engine.refresh(market))
    }

    /// `limit` is clamped as in [`ranking::clamp_limit`].
    pub fn top_markets(&self, metric: RankMetric, limit: Option<usize>) -> Vec<Arc<MarketAnalytics>> {
        ranking::top_markets(&self.cache, metric, ranking::clamp_limit(limit))
    }

    pub fn trending(&self, metric: RankMetric, limit: Option<usize>) -> Vec<TrendingMarket> {
        ranking::trending_markets(&self.cache, metric, ranking::clamp_limit(limit))
    }

    pub async fn market_summaries(&self) -> Result<Vec<MarketSummary>, ServiceError> {
        let markets = self.markets().await?;
        let summaries = markets
            .iter()
            .map(|market| {
                let analytics = self.cache.get_analytics(&market.market_id);
                let metric = |f: fn(&MarketAnalytics) -> f64| analytics.as_deref().map(f).unwrap_or(0.0);
                MarketSummary {
                    market_id: market.market_id.clone(),
                    base_denom: market.base_denom.clone(),
                    quote_denom: market.quote_denom.clone(),
                    volume: metric(|a| a.volume_24h),
                    price: metric(|a| a.current_price),
                    volatility: metric(|a| a.volatility),
                    liquidity_score: metric(|a| a.liquidity_score),
                }
            })
            .collect();
        Ok(summaries)
    }

    /// Resting notional on both sides of the book plus its depth profile.
    pub async fn liquidity(&self, market_id: &str) -> Result<LiquidityReport, ServiceError> {
        let book = self.orderbook(market_id).await?;
        Ok(LiquidityReport {
            market_id: market_id.to_string(),
            liquidity_score: book.total_notional(),
            orderbook_depth: book.depth(),
        })
    }
}
