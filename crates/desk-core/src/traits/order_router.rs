//! Broker-level order routing capability.

use crate::error::BrokerError;
use crate::types::{OrderId, OrderSpec};
use async_trait::async_trait;

/// Routes ledger orders to the backend.
///
/// Both calls return as soon as the backend has accepted the instruction;
/// progress arrives later as status/execution/commission events pushed into
/// the ledger.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Submit a new order under the ledger-assigned id.
    async fn place(&self, id: OrderId, spec: &OrderSpec) -> Result<(), BrokerError>;

    /// Request cancellation of a working order.
    async fn cancel(&self, id: OrderId) -> Result<(), BrokerError>;
}
