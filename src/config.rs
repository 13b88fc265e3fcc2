// Runtime settings, layered: defaults < optional TOML file < MARKET_PULSE__*
// environment variables (`__` separates nested keys) < CLI flags.

use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::market_data::adapters::injective::DEFAULT_BASE_URL;
use crate::market_data::CollectorConfig;

pub const ENV_PREFIX: &str = "MARKET_PULSE";
// Upper bound for any interval, TTL or warm-up, in seconds
pub const MAX_DURATION_SECS: u64 = 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` still wins.
    pub log_filter: String,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    pub metrics_port: u16,
    pub upstream: UpstreamSettings,
    pub collector: CollectorSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    pub markets_interval_secs: u64,
    pub orderbooks_interval_secs: u64,
    pub trades_interval_secs: u64,
    pub price_history_interval_secs: u64,
    pub analytics_interval_secs: u64,
    pub analytics_warmup_secs: u64,
    pub sweep_interval_secs: u64,
    pub markets_ttl_secs: u64,
    pub orderbook_ttl_secs: u64,
    pub orderbook_fanout: usize,
    pub trades_fanout: usize,
    pub trades_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub interval_secs: u64,
    pub metric: String,
    pub limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info,market_pulse=info".to_string(),
            metrics_port: 9000,
            upstream: UpstreamSettings::default(),
            collector: CollectorSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), request_timeout_ms: 10_000 }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        let defaults = CollectorConfig::default();
        Self {
            markets_interval_secs: defaults.markets_interval.as_secs(),
            orderbooks_interval_secs: defaults.orderbooks_interval.as_secs(),
            trades_interval_secs: defaults.trades_interval.as_secs(),
            price_history_interval_secs: defaults.price_history_interval.as_secs(),
            analytics_interval_secs: defaults.analytics_interval.as_secs(),
            analytics_warmup_secs: defaults.analytics_warmup.as_secs(),
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
            markets_ttl_secs: defaults.markets_ttl.as_secs(),
            orderbook_ttl_secs: defaults.orderbook_ttl.as_secs(),
            orderbook_fanout: defaults.orderbook_fanout,
            trades_fanout: defaults.trades_fanout,
            trades_limit: defaults.trades_limit,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { interval_secs: 30, metric: "trending".to_string(), limit: 10 }
    }
}

/// Flags that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_filter: Option<String>,
    pub base_url: Option<String>,
    pub report_interval_secs: Option<u64>,
    pub metric: Option<String>,
    pub limit: Option<usize>,
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Defaults, then `path` if it exists, then the environment.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment());
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(filter) = overrides.log_filter {
            self.log_filter = filter;
        }
        if let Some(url) = overrides.base_url {
            self.upstream.base_url = url;
        }
        if let Some(secs) = overrides.report_interval_secs {
            self.report.interval_secs = secs;
        }
        if let Some(metric) = overrides.metric {
            self.report.metric = metric;
        }
        if let Some(limit) = overrides.limit {
            self.report.limit = limit;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field: &'static str, reason: &'static str| Err(SettingsError::Invalid { field, reason });

        if self.upstream.base_url.trim().is_empty() {
            return invalid("upstream.base_url", "must not be empty");
        }
        if self.upstream.request_timeout_ms == 0 {
            return invalid("upstream.request_timeout_ms", "must be positive");
        }

        let c = &self.collector;
        let intervals = [
            ("collector.markets_interval_secs", c.markets_interval_secs),
            ("collector.orderbooks_interval_secs", c.orderbooks_interval_secs),
            ("collector.trades_interval_secs", c.trades_interval_secs),
            ("collector.price_history_interval_secs", c.price_history_interval_secs),
            ("collector.analytics_interval_secs", c.analytics_interval_secs),
            ("collector.sweep_interval_secs", c.sweep_interval_secs),
            ("report.interval_secs", self.report.interval_secs),
        ];
        if let Some((field, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return invalid(*field, "must be positive");
        }
        let ttls = [("collector.markets_ttl_secs", c.markets_ttl_secs), ("collector.orderbook_ttl_secs", c.orderbook_ttl_secs)];
        if let Some((field, _)) = ttls.iter().find(|(_, secs)| *secs == 0) {
            return invalid(*field, "must be positive");
        }

        let warmup = [("collector.analytics_warmup_secs", c.analytics_warmup_secs)];
        let oversized = intervals.iter().chain(&ttls).chain(&warmup).find(|(_, secs)| *secs > MAX_DURATION_SECS);
        if let Some((field, _)) = oversized {
            return invalid(*field, "must not exceed one day");
        }
        if c.trades_limit == 0 {
            return invalid("collector.trades_limit", "must be positive");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report.interval_secs)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        let c = &self.collector;
        CollectorConfig {
            markets_interval: Duration::from_secs(c.markets_interval_secs),
            orderbooks_interval: Duration::from_secs(c.orderbooks_interval_secs),
            trades_interval: Duration::from_secs(c.trades_interval_secs),
            price_history_interval: Duration::from_secs(c.price_history_interval_secs),
            analytics_interval: Duration::from_secs(c.analytics_interval_secs),
            analytics_warmup: Duration::from_secs(c.analytics_warmup_secs),
            sweep_interval: Duration::from_secs(c.sweep_interval_secs),
            markets_ttl: Duration::from_secs(c.markets_ttl_secs),
            orderbook_ttl: Duration::from_secs(c.orderbook_ttl_secs),
            orderbook_fanout: c.orderbook_fanout,
            trades_fanout: c.trades_fanout,
            trades_limit: c.trades_limit,
            request_timeout: self.request_timeout(),
        }
    }
}
