//! Live capability adapter and event pump.

use std::sync::Arc;

use async_trait::async_trait;
use desk_core::{
    AccountPnl, AccountSnapshot, AccountService, BrokerError, BrokerEvent, FeedHandle, FeedKey,
    MarketDataService, OrderId, OrderRouter, OrderSpec, Position, PositionPnl,
};
use desk_feed::SubscriptionRegistry;
use desk_orders::OrderLedger;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::connection::BrokerConnection;

/// Adapts a [`BrokerConnection`] to the engine's capability traits.
///
/// Every call is refused with [`BrokerError::Unavailable`] while the
/// connection reports down, so a lost session surfaces as a
/// request-scoped failure instead of hanging the dispatcher.
pub struct LiveBroker {
    conn: Arc<dyn BrokerConnection>,
}

impl LiveBroker {
    pub fn new(conn: Arc<dyn BrokerConnection>) -> Self {
        Self { conn }
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.conn.is_connected() {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("broker connection lost".into()))
        }
    }
}

#[async_trait]
impl AccountService for LiveBroker {
    async fn summary(&self) -> Result<AccountSnapshot, BrokerError> {
        self.ensure_connected()?;
        self.conn.account_summary().await
    }

    async fn pnl(&self) -> Result<AccountPnl, BrokerError> {
        self.ensure_connected()?;
        self.conn.account_pnl().await
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;
        self.conn.positions().await
    }

    async fn position_pnl(&self, position: &Position) -> Result<PositionPnl, BrokerError> {
        self.ensure_connected()?;
        self.conn.position_pnl(position).await
    }
}

#[async_trait]
impl MarketDataService for LiveBroker {
    async fn open_feed(&self, key: &FeedKey) -> Result<FeedHandle, BrokerError> {
        self.ensure_connected()?;
        self.conn.open_market_data(key).await
    }

    async fn close_feed(&self, key: &FeedKey, handle: FeedHandle) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.conn.close_market_data(key, handle).await
    }
}

#[async_trait]
impl OrderRouter for LiveBroker {
    async fn place(&self, id: OrderId, spec: &OrderSpec) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.conn.place_order(id, spec).await
    }

    async fn cancel(&self, id: OrderId) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.conn.cancel_order(id).await
    }
}

/// Drain the vendor's event stream into the registry and ledger.
///
/// Ticks route by feed handle; order events route by order id. The task
/// ends when the connection drops its sender.
pub fn spawn_event_pump(
    runtime: &tokio::runtime::Handle,
    mut events: mpsc::UnboundedReceiver<BrokerEvent>,
    registry: Arc<SubscriptionRegistry>,
    ledger: Arc<OrderLedger>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        info!("broker event pump started");
        while let Some(event) = events.recv().await {
            match event {
                BrokerEvent::Tick { handle, sample } => {
                    registry.ingest_by_handle(handle, sample);
                }
                BrokerEvent::OrderStatus { id, event } => ledger.record_status(id, event),
                BrokerEvent::Execution { id, execution } => ledger.record_execution(id, execution),
                BrokerEvent::Commission { id, report } => ledger.record_commission(id, report),
                BrokerEvent::ExecutionsComplete { id } => ledger.mark_executions_complete(id),
            }
        }
        debug!("broker event stream closed");
    })
}
