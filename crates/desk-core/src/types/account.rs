//! Account value objects.
//!
//! All of these are read-only snapshots; every account query produces a
//! fresh value rather than mutating a shared one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FeedKey;

/// Point-in-time view of the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account identifier at the backend
    pub account: String,
    /// Settled cash
    pub cash: Decimal,
    /// Cash plus market value of positions
    pub equity: Decimal,
    /// Funds available for new orders
    pub buying_power: Decimal,
    /// When the snapshot was taken (simulated time in backtest)
    pub timestamp: DateTime<Utc>,
}

/// Account-level profit and loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountPnl {
    pub realized: Decimal,
    pub unrealized: Decimal,
}

impl AccountPnl {
    pub fn total(&self) -> Decimal {
        self.realized + self.unrealized
    }
}

/// A position in a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: FeedKey,
    /// Positive for long, negative for short
    pub quantity: Decimal,
    /// Average acquisition cost per unit
    pub avg_cost: Decimal,
    /// Last known market price
    pub market_price: Decimal,
}

impl Position {
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.market_price
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }
}

/// Profit and loss attributed to a single position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPnl {
    pub instrument: FeedKey,
    pub unrealized: Decimal,
    pub realized: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_market_value() {
        let position = Position {
            instrument: FeedKey::stock("AAPL"),
            quantity: dec!(100),
            avg_cost: dec!(150),
            market_price: dec!(160),
        };
        assert_eq!(position.market_value(), dec!(16000));
        assert!(position.is_long());
        assert!(!position.is_short());
    }

    #[test]
    fn test_pnl_total() {
        let pnl = AccountPnl {
            realized: dec!(250),
            unrealized: dec!(-100),
        };
        assert_eq!(pnl.total(), dec!(150));
    }
}
