// Small numeric helpers shared by the analytics engine.

// Weights of the trending heuristic: dampened volume, volatility, |price change %|
pub const TRENDING_VOLUME_WEIGHT: f64 = 0.4;
pub const TRENDING_VOLATILITY_WEIGHT: f64 = 0.3;
pub const TRENDING_CHANGE_WEIGHT: f64 = 0.3;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Relative change in percent; 0 when `old` is 0.
pub fn percentage_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

pub fn absolute_change(old: f64, new: f64) -> f64 {
    new - old
}

/// Spread expressed in basis points of the mid price; 0 when mid is 0.
pub fn spread_bps(spread: f64, mid_price: f64) -> f64 {
    if mid_price == 0.0 {
        return 0.0;
    }
    spread / mid_price * 10_000.0
}

pub fn liquidity_score(volume: f64, spread: f64) -> f64 {
    volume / (spread + 1.0)
}

pub fn trending_score(volume: f64, volatility: f64, price_change_pct: f64) -> f64 {
    TRENDING_VOLUME_WEIGHT * (volume + 1.0).log10()
        + TRENDING_VOLATILITY_WEIGHT * volatility
        + TRENDING_CHANGE_WEIGHT * price_change_pct.abs()
}
