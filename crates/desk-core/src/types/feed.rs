//! Market-data feed identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Security type of a tradeable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Stock,
    Future,
    Option,
    Forex,
    Index,
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityType::Stock => "STK",
            SecurityType::Future => "FUT",
            SecurityType::Option => "OPT",
            SecurityType::Forex => "CASH",
            SecurityType::Index => "IND",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SecurityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STK" | "STOCK" => Ok(SecurityType::Stock),
            "FUT" | "FUTURE" => Ok(SecurityType::Future),
            "OPT" | "OPTION" => Ok(SecurityType::Option),
            "CASH" | "FOREX" | "FX" => Ok(SecurityType::Forex),
            "IND" | "INDEX" => Ok(SecurityType::Index),
            _ => Err(format!("Invalid security type: {}", s)),
        }
    }
}

/// Identity of a market-data subscription.
///
/// Two keys are equal iff all four identity fields match. The
/// broker-assigned [`FeedHandle`] is session-scoped routing metadata and
/// deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedKey {
    /// Ticker symbol, e.g. "AAPL"
    pub ticker: String,
    /// Security type
    pub security_type: SecurityType,
    /// Exchange or routing destination
    pub exchange: String,
    /// Quote currency
    pub currency: String,
}

impl FeedKey {
    /// Create a feed key from its four identity fields.
    pub fn new(
        ticker: impl Into<String>,
        security_type: SecurityType,
        exchange: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            security_type,
            exchange: exchange.into(),
            currency: currency.into(),
        }
    }

    /// Shorthand for a smart-routed USD stock.
    pub fn stock(ticker: impl Into<String>) -> Self {
        Self::new(ticker, SecurityType::Stock, "SMART", "USD")
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.ticker, self.security_type, self.exchange, self.currency
        )
    }
}

/// Broker-assigned identifier for one active feed subscription.
///
/// Valid only while the subscription's reference count is above zero; a
/// released handle may be reused by the backend for a later subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedHandle(pub u64);

impl fmt::Display for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feed#{}", self.0)
    }
}

/// Identifies one independent market-data consumer or order owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerId(String);

impl ConsumerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConsumerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single raw price observation from a feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Trade or mid price
    pub price: f64,
    /// Size traded at this price
    pub size: f64,
}

impl PriceSample {
    pub fn new(timestamp_ms: i64, price: f64, size: f64) -> Self {
        Self {
            timestamp_ms,
            price,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_identity_ignores_nothing() {
        let a = FeedKey::stock("AAPL");
        let b = FeedKey::new("AAPL", SecurityType::Stock, "SMART", "USD");
        assert_eq!(a, b);

        let c = FeedKey::new("AAPL", SecurityType::Stock, "NASDAQ", "USD");
        assert_ne!(a, c);
    }

    #[test]
    fn test_security_type_parse() {
        assert_eq!(SecurityType::from_str("stk").unwrap(), SecurityType::Stock);
        assert_eq!(SecurityType::from_str("FX").unwrap(), SecurityType::Forex);
        assert!(SecurityType::from_str("bond").is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(FeedKey::stock("MSFT").to_string(), "MSFT.STK.SMART.USD");
    }
}
