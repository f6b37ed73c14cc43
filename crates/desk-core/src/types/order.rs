//! Order lifecycle types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::FeedKey;
use crate::error::EngineError;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Sign for position arithmetic (+1 for buy, -1 for sell).
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute at the next available price
    Market,
    /// Execute at the limit price or better
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MKT"),
            OrderType::Limit => write!(f, "LMT"),
        }
    }
}

/// Ledger-assigned order identifier. Allocated once, never reused within a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order#{}", self.0)
    }
}

/// Order status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created locally, not yet acknowledged by the backend
    PendingSubmit,
    /// Acknowledged by the backend
    Submitted,
    /// Some quantity filled, more outstanding
    PartiallyFilled,
    /// Resting at the backend between partial fills
    Pending,
    /// Completely filled
    Filled,
    /// Cancel requested, not yet confirmed
    PendingCancel,
    /// Cancel confirmed
    Cancelled,
    /// Rejected or otherwise dead at the backend
    Inactive,
    /// Unrecognized backend state
    Other,
}

impl OrderStatus {
    /// Check if no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Inactive | OrderStatus::Other
        )
    }

    /// Check if the order is still working at the backend.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::PendingSubmit => "pending_submit",
            OrderStatus::Submitted => "submitted",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::PendingCancel => "pending_cancel",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Inactive => "inactive",
            OrderStatus::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Immutable specification of an order to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Instrument to trade
    pub instrument: FeedKey,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Quantity to trade
    pub quantity: Decimal,
    /// Limit price (limit orders only)
    pub limit_price: Option<Decimal>,
}

impl OrderSpec {
    /// Create a market order spec.
    pub fn market(instrument: FeedKey, side: Side, quantity: Decimal) -> Self {
        Self {
            instrument,
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
        }
    }

    /// Create a limit order spec.
    pub fn limit(instrument: FeedKey, side: Side, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            instrument,
            side,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(limit_price),
        }
    }

    /// Validate the spec before any state is touched.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.quantity <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "order quantity must be positive, got {}",
                self.quantity
            )));
        }
        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => Err(EngineError::Validation(
                "limit order requires a limit price".to_string(),
            )),
            (OrderType::Limit, Some(p)) if p <= Decimal::ZERO => Err(EngineError::Validation(
                format!("limit price must be positive, got {}", p),
            )),
            (OrderType::Market, Some(_)) => Err(EngineError::Validation(
                "market order must not carry a limit price".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// One status transition reported by the backend.
///
/// Events are appended to the order history verbatim, in arrival order;
/// duplicates and reorderings relative to wall-clock time are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: OrderStatus,
    /// Total quantity filled as of this event
    pub cumulative_filled: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(status: OrderStatus, cumulative_filled: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            cumulative_filled,
            timestamp,
        }
    }
}

/// A single execution (fill) reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub exec_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Commission charged for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionReport {
    pub exec_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_terminal_statuses() {
        for s in [
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Inactive,
            OrderStatus::Other,
        ] {
            assert!(s.is_terminal());
            assert!(!s.is_active());
        }
        for s in [
            OrderStatus::PendingSubmit,
            OrderStatus::Submitted,
            OrderStatus::PartiallyFilled,
            OrderStatus::Pending,
            OrderStatus::PendingCancel,
        ] {
            assert!(s.is_active());
        }
    }

    #[test]
    fn test_spec_validation() {
        let key = FeedKey::stock("AAPL");

        assert!(OrderSpec::market(key.clone(), Side::Buy, dec!(100))
            .validate()
            .is_ok());
        assert!(OrderSpec::limit(key.clone(), Side::Sell, dec!(10), dec!(150))
            .validate()
            .is_ok());

        assert!(OrderSpec::market(key.clone(), Side::Buy, dec!(0))
            .validate()
            .is_err());
        assert!(OrderSpec::limit(key.clone(), Side::Buy, dec!(10), dec!(-1))
            .validate()
            .is_err());

        let mut missing_price = OrderSpec::limit(key, Side::Buy, dec!(10), dec!(1));
        missing_price.limit_price = None;
        assert!(missing_price.validate().is_err());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
