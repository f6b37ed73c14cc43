//! Account query capability.

use crate::error::BrokerError;
use crate::types::{AccountPnl, AccountSnapshot, Position, PositionPnl};
use async_trait::async_trait;

/// Account queries against the active backend.
///
/// Every method returns a fresh value object; nothing is mutated in place.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Get a point-in-time account summary.
    async fn summary(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Get account-level profit and loss.
    async fn pnl(&self) -> Result<AccountPnl, BrokerError>;

    /// Get all open positions.
    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Get profit and loss attributed to one position.
    async fn position_pnl(&self, position: &Position) -> Result<PositionPnl, BrokerError>;
}
