use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use market_pulse::cache::MarketCache;
use market_pulse::config::{Overrides, Settings};
use market_pulse::engine::ranking::RankMetric;
use market_pulse::market_data::adapters::injective::InjectiveClient;
use market_pulse::market_data::adapters::MarketDataSource;
use market_pulse::market_data::{Collector, MarketService};
use market_pulse::telemetry;

#[derive(Parser, Debug)]
#[command(name = "market-pulse")]
#[command(about = "Collects spot market data into an in-memory cache and ranks markets")]
#[command(version)]
struct Cli {
    /// Settings file; missing is fine, defaults and MARKET_PULSE__* variables apply
    #[arg(short, long, default_value = "market-pulse.toml")]
    config: PathBuf,

    /// Log filter, e.g. "info,market_pulse=debug"
    #[arg(long)]
    log_filter: Option<String>,

    /// Upstream REST endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds between ranking reports
    #[arg(long)]
    report_interval: Option<u64>,

    /// Ranking metric: volume, volatility, trending or price_change
    #[arg(long)]
    metric: Option<String>,

    /// Markets per report (1-50)
    #[arg(long)]
    limit: Option<usize>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            log_filter: self.log_filter.clone(),
            base_url: self.base_url.clone(),
            report_interval_secs: self.report_interval,
            metric: self.metric.clone(),
            limit: self.limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    settings.apply_overrides(cli.overrides());
    settings.validate()?;

    telemetry::init_tracing(&settings.log_filter)?;
    telemetry::init_metrics(settings.metrics_port)?;

    let metric = settings.report.metric.parse::<RankMetric>().unwrap_or_else(|e| {
        warn!(error = %e, fallback = %RankMetric::default(), "Unknown report metric");
        RankMetric::default()
    });

    let client = InjectiveClient::new(&settings.upstream.base_url, settings.request_timeout())?;
    info!(base_url = client.base_url(), "Using Injective spot API");
    let source: Arc<dyn MarketDataSource> = Arc::new(client);

    let cache = Arc::new(MarketCache::new());
    let collector_config = settings.collector_config();
    let service = MarketService::new(Arc::clone(&cache), Arc::clone(&source), collector_config.clone());
    let collector = Collector::start(cache, source, collector_config);

    let mut report = tokio::time::interval(settings.report_interval());
    report.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    report.tick().await; // first tick is immediate, nothing is cached yet

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    info!("Running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            received = &mut shutdown => {
                received?;
                break;
            }
            _ = report.tick() => log_report(&service, metric, settings.report.limit),
        }
    }

    collector.stop().await;
    info!("Shutdown complete");
    Ok(())
}

fn log_report(service: &MarketService, metric: RankMetric, limit: usize) {
    let stats = service.cache().stats();
    let ranked = service.trending(metric, Some(limit));
    if ranked.is_empty() {
        info!(?stats, "No fresh analytics yet");
        return;
    }

    info!(%metric, markets = ranked.len(), ?stats, "Top markets");
    for (rank, market) in ranked.iter().enumerate() {
        info!(
            rank = rank + 1,
            symbol = %market.symbol,
            score = market.score,
            volume = market.volume_24h,
            volatility = market.volatility,
            change_pct = market.price_change_pct,
            "Ranked market"
        );
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
