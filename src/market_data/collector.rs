// Background collection: one tokio task per data category, each on its own
// interval, all sharing the cache and a broadcast shutdown signal.
//
// Shutdown is only observed between cycles, so a cycle that has started
// always finishes its writes.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{future, stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::MarketCache;
use crate::engine::analytics::AnalyticsEngine;
use crate::market_data::adapters::{with_timeout, MarketDataSource};
use crate::market_data::normaliser;
use crate::market_data::types::{unix_millis, Market};

// Upstream requests in flight at once within one cycle
const FETCH_CONCURRENCY: usize = 8;
const MIN_PERIOD: Duration = Duration::from_millis(1);
// Longest delay or period handed to the timer; keeps deadlines representable
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub markets_interval: Duration,
    pub orderbooks_interval: Duration,
    pub trades_interval: Duration,
    pub price_history_interval: Duration,
    pub analytics_interval: Duration,
    pub analytics_warmup: Duration,
    pub sweep_interval: Duration,
    pub markets_ttl: Duration,
    pub orderbook_ttl: Duration,
    /// Order books refreshed per cycle, first N of the market list.
    pub orderbook_fanout: usize,
    /// Trade windows refreshed per cycle, first N of the market list.
    pub trades_fanout: usize,
    pub trades_limit: usize,
    pub request_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            markets_interval: Duration::from_secs(10),
            orderbooks_interval: Duration::from_secs(5),
            trades_interval: Duration::from_secs(10),
            price_history_interval: Duration::from_secs(60),
            analytics_interval: Duration::from_secs(15),
            analytics_warmup: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(30),
            markets_ttl: Duration::from_secs(10),
            orderbook_ttl: Duration::from_secs(5),
            orderbook_fanout: 50,
            trades_fanout: 30,
            trades_limit: 100,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Markets,
    Orderbooks,
    Trades,
    PriceHistory,
    Analytics,
    Sweep,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Markets,
        Task::Orderbooks,
        Task::Trades,
        Task::PriceHistory,
        Task::Analytics,
        Task::Sweep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Task::Markets => "markets",
            Task::Orderbooks => "orderbooks",
            Task::Trades => "trades",
            Task::PriceHistory => "price_history",
            Task::Analytics => "analytics",
            Task::Sweep => "sweep",
        }
    }

    // (delay before the first cycle, period)
    fn schedule(self, config: &CollectorConfig) -> (Duration, Duration) {
        let (delay, period) = match self {
            Task::Markets => (Duration::ZERO, config.markets_interval),
            Task::Orderbooks => (config.orderbooks_interval, config.orderbooks_interval),
            Task::Trades => (config.trades_interval, config.trades_interval),
            Task::PriceHistory => (config.price_history_interval, config.price_history_interval),
            Task::Analytics => (config.analytics_warmup, config.analytics_interval),
            Task::Sweep => (config.sweep_interval, config.sweep_interval),
        };
        (delay.min(MAX_PERIOD), period.clamp(MIN_PERIOD, MAX_PERIOD))
    }
}

/// Handle to the running collection tasks.
///
/// Dropping it without calling [`Collector::stop`] also ends the tasks: they
/// see the closed channel at their next wait, but nobody waits for them.
pub struct Collector {
    shutdown: broadcast::Sender<()>,
    handles: Vec<(Task, JoinHandle<()>)>,
}

impl Collector {
    /// Spawn every collection task on the current tokio runtime.
    pub fn start(cache: Arc<MarketCache>, source: Arc<dyn MarketDataSource>, config: CollectorConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        let worker = Worker {
            engine: AnalyticsEngine::new(Arc::clone(&cache)),
            cache,
            source,
            config: Arc::new(config),
        };

        let handles = Task::ALL
            .into_iter()
            .map(|task| {
                let rx = shutdown.subscribe();
                (task, tokio::spawn(run_loop(worker.clone(), task, rx)))
            })
            .collect();

        info!(tasks = Task::ALL.len(), "Collector started");
        Self { shutdown, handles }
    }

    /// Signal every task and wait until all of them have exited.
    /// No scheduler write happens after this returns.
    pub async fn stop(self) {
        info!("Stopping collector");
        // Err only means every task is already gone
        let _ = self.shutdown.send(());

        let (tasks, handles): (Vec<Task>, Vec<JoinHandle<()>>) = self.handles.into_iter().unzip();
        for (task, joined) in tasks.into_iter().zip(future::join_all(handles).await) {
            if let Err(e) = joined {
                error!(task = task.name(), error = %e, "Collector task ended abnormally");
            }
        }
        info!("Collector stopped");
    }
}

async fn run_loop(worker: Worker, task: Task, mut shutdown: broadcast::Receiver<()>) {
    let (delay, period) = task.schedule(&worker.config);
    let mut ticker = time::interval_at(time::Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(task = task.name(), ?delay, ?period, "Collector task running");

    loop {
        tokio::select! {
            biased;
            // a signal, a lagged receiver or a dropped sender all mean stop
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
        }

        let started = std::time::Instant::now();
        worker.run_cycle(task).await;
        metrics::histogram!("market_pulse_cycle_seconds", "task" => task.name())
            .record(started.elapsed().as_secs_f64());
    }

    debug!(task = task.name(), "Collector task exited");
}

// Ids of the first `cap` markets in list order
fn leading_ids(markets: &[Market], cap: usize) -> Vec<String> {
    markets.iter().take(cap).map(|m| m.market_id.clone()).collect()
}

#[derive(Clone)]
struct Worker {
    cache: Arc<MarketCache>,
    source: Arc<dyn MarketDataSource>,
    engine: AnalyticsEngine,
    config: Arc<CollectorConfig>,
}

impl Worker {
    async fn run_cycle(&self, task: Task) {
        match task {
            Task::Markets => self.refresh_markets().await,
            Task::Orderbooks => self.refresh_orderbooks().await,
            Task::Trades => self.refresh_trades().await,
            Task::PriceHistory => self.extract_prices(),
            Task::Analytics => self.compute_analytics(),
            Task::Sweep => self.sweep(),
        }
    }

    fn record_failure(&self, task: Task, market_id: Option<&str>, kind: &'static str, error: &dyn Display) {
        warn!(task = task.name(), market_id, kind, error = %error, "Collection failed");
        metrics::counter!("market_pulse_collector_failures_total", "task" => task.name(), "kind" => kind).increment(1);
    }

    fn known_markets(&self, task: Task) -> Option<Arc<Vec<Market>>> {
        let markets = self.cache.get_markets();
        if markets.is_none() {
            debug!(task = task.name(), "No market list cached, skipping cycle");
        }
        markets
    }

    #[instrument(level = "debug", skip(self))]
    async fn refresh_markets(&self) {
        let payload = match with_timeout(self.config.request_timeout, self.source.fetch_markets()).await {
            Ok(payload) => payload,
            Err(e) => return self.record_failure(Task::Markets, None, "fetch", &e),
        };
        match normaliser::parse_markets(&payload) {
            Ok(markets) => {
                let count = markets.len();
                self.cache.set_markets(markets, self.config.markets_ttl);
                info!(markets = count, "Market list refreshed");
            }
            Err(e) => self.record_failure(Task::Markets, None, "parse", &e),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn refresh_orderbooks(&self) {
        let Some(markets) = self.known_markets(Task::Orderbooks) else { return };
        let ids = leading_ids(&markets, self.config.orderbook_fanout);
        let targets = ids.len();

        let refreshed = stream::iter(ids)
            .map(|id| async move { self.refresh_orderbook(&id).await })
            .buffer_unordered(FETCH_CONCURRENCY)
            .filter(|ok| future::ready(*ok))
            .count()
            .await;
        info!(targets, refreshed, "Order books refreshed");
    }

    async fn refresh_orderbook(&self, market_id: &str) -> bool {
        let call = self.source.fetch_orderbook(market_id);
        let payload = match with_timeout(self.config.request_timeout, call).await {
            Ok(payload) => payload,
            Err(e) => {
                self.record_failure(Task::Orderbooks, Some(market_id), "fetch", &e);
                return false;
            }
        };
        match normaliser::parse_orderbook(&payload) {
            Ok(book) => {
                self.cache.set_orderbook(market_id, book, self.config.orderbook_ttl);
                true
            }
            Err(e) => {
                self.record_failure(Task::Orderbooks, Some(market_id), "parse", &e);
                false
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn refresh_trades(&self) {
        let Some(markets) = self.known_markets(Task::Trades) else { return };
        let ids = leading_ids(&markets, self.config.trades_fanout);
        let targets = ids.len();

        let refreshed = stream::iter(ids)
            .map(|id| async move { self.refresh_trade_window(&id).await })
            .buffer_unordered(FETCH_CONCURRENCY)
            .filter(|ok| future::ready(*ok))
            .count()
            .await;
        info!(targets, refreshed, "Trade windows refreshed");
    }

    async fn refresh_trade_window(&self, market_id: &str) -> bool {
        let call = self.source.fetch_trades(market_id, self.config.trades_limit);
        let payload = match with_timeout(self.config.request_timeout, call).await {
            Ok(payload) => payload,
            Err(e) => {
                self.record_failure(Task::Trades, Some(market_id), "fetch", &e);
                return false;
            }
        };
        match normaliser::parse_trades(market_id, &payload, unix_millis()) {
            Ok(trades) => {
                self.cache.set_trades(market_id, trades);
                true
            }
            Err(e) => {
                self.record_failure(Task::Trades, Some(market_id), "parse", &e);
                false
            }
        }
    }

    // Samples the mid of each cached book into the price history
    fn extract_prices(&self) {
        let Some(markets) = self.known_markets(Task::PriceHistory) else { return };
        let now_ms = unix_millis();

        let mut sampled = 0usize;
        for market in markets.iter() {
            let mid = self.cache.get_orderbook(&market.market_id).and_then(|book| book.mid_price());
            if let Some(mid) = mid.filter(|p| *p > 0.0) {
                self.cache.append_price(&market.market_id, mid, now_ms);
                sampled += 1;
            }
        }
        info!(markets = markets.len(), sampled, "Price history sampled");
    }

    fn compute_analytics(&self) {
        let Some(markets) = self.known_markets(Task::Analytics) else { return };
        let computed = self.engine.refresh_all(&markets);
        info!(markets = markets.len(), computed, "Analytics computed");
    }

    fn sweep(&self) {
        let report = self.cache.clean_expired();
        let stats = self.cache.stats();

        metrics::gauge!("market_pulse_cache_entries", "category" => "orderbooks").set(stats.orderbooks as f64);
        metrics::gauge!("market_pulse_cache_entries", "category" => "trade_windows").set(stats.trade_windows as f64);
        metrics::gauge!("market_pulse_cache_entries", "category" => "price_histories")
            .set(stats.price_histories as f64);
        metrics::gauge!("market_pulse_cache_entries", "category" => "analytics").set(stats.analytics as f64);

        if report.total() > 0 {
            info!(
                markets = report.markets,
                orderbooks = report.orderbooks,
                analytics = report.analytics,
                "Evicted expired entries"
            );
        } else {
            debug!(?stats, "Sweep found nothing to evict");
        }
    }
}
