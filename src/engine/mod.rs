// Derived metrics over cache contents
pub mod analytics;  // per-market computation + write-back
pub mod book;       // typed order book, spread / mid / depth
pub mod ranking;    // top-N queries over fresh analytics
pub mod stats;      // mean, std-dev, percentage change, score formulas
pub mod types;      // analytics records served to clients
