// Market data module entrypoint
pub mod adapters;    // upstream sources (Injective REST) behind MarketDataSource
pub mod collector;   // periodic background tasks feeding the cache
pub mod normaliser;  // raw JSON -> typed markets, books, trades
pub mod service;     // cache-or-fetch accessors + rankings for callers
pub mod types;       // Market, Trade

pub use collector::{Collector, CollectorConfig};
pub use service::{MarketService, ServiceError};
