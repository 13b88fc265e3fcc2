use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

// Spot market as listed by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    pub market_id: String,
    pub base_denom: String,
    pub quote_denom: String,
    pub ticker: Option<String>, // e.g. "INJ/USDT", not every venue sends one
}

impl Market {
    pub fn new(market_id: &str, base_denom: &str, quote_denom: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            base_denom: base_denom.to_string(),
            quote_denom: quote_denom.to_string(),
            ticker: None,
        }
    }

    /// Display symbol: the venue ticker when present, `base/quote` otherwise.
    pub fn symbol(&self) -> String {
        match &self.ticker {
            Some(ticker) if !ticker.is_empty() => ticker.clone(),
            _ => format!("{}/{}", self.base_denom, self.quote_denom),
        }
    }
}

// Executed trade, already converted from the wire representation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub market_id: String,
    pub price: f64,
    pub quantity: f64,
    pub timestamp_ms: u64,
    pub is_buy: bool,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Wall clock in milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_prefers_ticker() {
        let mut market = Market::new("0xabc", "inj", "peggy0xdac17f");
        assert_eq!(market.symbol(), "inj/peggy0xdac17f");

        market.ticker = Some("INJ/USDT".into());
        assert_eq!(market.symbol(), "INJ/USDT");

        market.ticker = Some(String::new());
        assert_eq!(market.symbol(), "inj/peggy0xdac17f");
    }

    #[test]
    fn test_trade_notional() {
        let trade = Trade { market_id: "m".into(), price: 2.5, quantity: 4.0, timestamp_ms: 0, is_buy: true };
        assert_eq!(trade.notional(), 10.0);
    }
}
