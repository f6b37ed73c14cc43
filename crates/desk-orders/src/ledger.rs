//! The order ledger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use desk_core::{
    CommissionReport, ConsumerId, EngineResult, Execution, OrderError, OrderId, OrderRouter,
    OrderSpec, StatusEvent,
};
use tracing::{debug, warn};

use crate::record::OrderRecord;

/// An order record shared between the ledger, the dispatcher's caller, and
/// the backend's ingestion path. The mutex is the per-order lock; callers
/// observe progress by re-locking and re-reading the same record.
pub type SharedOrderRecord = Arc<Mutex<OrderRecord>>;

/// Owns every order placed this session.
///
/// Records are never removed while the session lives; terminal orders stay
/// for audit. Event ingestion (status, execution, commission) may run on
/// any thread and takes only the per-order lock, so activity on one order
/// never blocks another.
pub struct OrderLedger {
    router: Arc<dyn OrderRouter>,
    orders: Mutex<HashMap<OrderId, SharedOrderRecord>>,
    next_id: AtomicU64,
}

impl OrderLedger {
    pub fn new(router: Arc<dyn OrderRouter>) -> Self {
        Self {
            router,
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Place a new order and return its shared record immediately.
    ///
    /// The record starts in `PendingSubmit`; all further progress arrives
    /// as backend events. If the backend refuses the submission the record
    /// is withdrawn and the error propagates, leaving no trace.
    pub async fn place(
        &self,
        owner: &ConsumerId,
        spec: OrderSpec,
    ) -> EngineResult<SharedOrderRecord> {
        spec.validate()?;

        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record: SharedOrderRecord =
            Arc::new(Mutex::new(OrderRecord::new(id, owner.clone(), spec.clone())));
        self.orders.lock().unwrap().insert(id, record.clone());

        if let Err(err) = self.router.place(id, &spec).await {
            self.orders.lock().unwrap().remove(&id);
            return Err(err.into());
        }
        debug!(%id, %owner, side = %spec.side, instrument = %spec.instrument, "order placed");
        Ok(record)
    }

    /// Request cancellation of a working order.
    ///
    /// Valid only while the current status is non-terminal; confirmation
    /// arrives later as `PendingCancel`/`Cancelled` status events.
    pub async fn cancel(&self, id: OrderId) -> EngineResult<()> {
        let record = self.get(id).ok_or(OrderError::UnknownOrder(id))?;
        {
            let record = record.lock().unwrap();
            let status = record.status();
            if status.is_terminal() {
                return Err(OrderError::InvalidState { id, status }.into());
            }
        }
        self.router.cancel(id).await?;
        debug!(%id, "cancel requested");
        Ok(())
    }

    /// Look up the shared record for `id`.
    pub fn get(&self, id: OrderId) -> Option<SharedOrderRecord> {
        self.orders.lock().unwrap().get(&id).cloned()
    }

    /// Point-in-time snapshots of `owner`'s non-terminal orders, ordered
    /// by id.
    pub fn open_orders(&self, owner: &ConsumerId) -> Vec<OrderRecord> {
        let mut open: Vec<OrderRecord> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .map(|r| r.lock().unwrap().clone())
            .filter(|r| r.owner() == owner && r.status().is_active())
            .collect();
        open.sort_by_key(|r| r.id());
        open
    }

    /// True while any order of any owner is non-terminal.
    pub fn has_open_orders(&self) -> bool {
        self.orders
            .lock()
            .unwrap()
            .values()
            .any(|r| r.lock().unwrap().status().is_active())
    }

    /// Append a status event reported by the backend.
    pub fn record_status(&self, id: OrderId, event: StatusEvent) {
        match self.get(id) {
            Some(record) => record.lock().unwrap().apply_status(event),
            None => warn!(%id, "status event for unknown order dropped"),
        }
    }

    /// Append an execution reported by the backend.
    pub fn record_execution(&self, id: OrderId, execution: Execution) {
        match self.get(id) {
            Some(record) => record.lock().unwrap().apply_execution(execution),
            None => warn!(%id, "execution for unknown order dropped"),
        }
    }

    /// Append a commission report.
    pub fn record_commission(&self, id: OrderId, report: CommissionReport) {
        match self.get(id) {
            Some(record) => record.lock().unwrap().apply_commission(report),
            None => warn!(%id, "commission for unknown order dropped"),
        }
    }

    /// Mark that no further execution reports will arrive for `id`.
    pub fn mark_executions_complete(&self, id: OrderId) {
        match self.get(id) {
            Some(record) => record.lock().unwrap().complete_executions(),
            None => warn!(%id, "end-of-executions for unknown order dropped"),
        }
    }
}
