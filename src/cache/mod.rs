// In-memory store shared by the collectors, the analytics engine and readers
pub mod store;  // MarketCache: per-category locks, TTL / freshness rules
pub mod types;  // entries, bounded windows, sweep + size reports

pub use store::MarketCache;
pub use types::*;
