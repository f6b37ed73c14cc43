//! Vendor broker-client boundary.

use async_trait::async_trait;
use desk_core::{
    AccountPnl, AccountSnapshot, BrokerError, FeedHandle, FeedKey, OrderId, OrderSpec, Position,
    PositionPnl,
};

/// The vendor client this engine talks to.
///
/// Implementations own the wire protocol, sessions, and reconnects. Calls
/// are request/acknowledge only; market data and order progress arrive on
/// the connection's event stream (see [`crate::spawn_event_pump`]), which
/// the vendor client may produce from its own callback threads.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// True while the session to the vendor gateway is up.
    fn is_connected(&self) -> bool;

    async fn account_summary(&self) -> Result<AccountSnapshot, BrokerError>;

    async fn account_pnl(&self) -> Result<AccountPnl, BrokerError>;

    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    async fn position_pnl(&self, position: &Position) -> Result<PositionPnl, BrokerError>;

    /// Start streaming market data for `key`; the returned handle tags
    /// every tick on the event stream.
    async fn open_market_data(&self, key: &FeedKey) -> Result<FeedHandle, BrokerError>;

    async fn close_market_data(&self, key: &FeedKey, handle: FeedHandle)
        -> Result<(), BrokerError>;

    /// Transmit a new order under the ledger-assigned id.
    async fn place_order(&self, id: OrderId, spec: &OrderSpec) -> Result<(), BrokerError>;

    async fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError>;
}
