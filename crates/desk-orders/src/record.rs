//! Per-order lifecycle record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use desk_core::{
    CommissionReport, ConsumerId, Execution, OrderId, OrderSpec, OrderStatus, StatusEvent,
};

/// Full lifecycle state of one placed order.
///
/// The history is append-only and timestamp-ordered by arrival: duplicate
/// or out-of-order backend events are preserved verbatim, never collapsed.
/// "Current status" is always the most recently appended entry. Executions
/// and commissions are independent append-only streams and may keep
/// arriving after a terminal status; an order is only fully settled once
/// the status is terminal *and* the backend has signalled the end of
/// execution reports.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    id: OrderId,
    owner: ConsumerId,
    spec: OrderSpec,
    history: Vec<StatusEvent>,
    cumulative_filled: Decimal,
    executions: Vec<Execution>,
    commissions: Vec<CommissionReport>,
    executions_complete: bool,
    created_at: DateTime<Utc>,
}

impl OrderRecord {
    pub(crate) fn new(id: OrderId, owner: ConsumerId, spec: OrderSpec) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            owner,
            spec,
            history: vec![StatusEvent::new(
                OrderStatus::PendingSubmit,
                Decimal::ZERO,
                created_at,
            )],
            cumulative_filled: Decimal::ZERO,
            executions: Vec::new(),
            commissions: Vec::new(),
            executions_complete: false,
            created_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn owner(&self) -> &ConsumerId {
        &self.owner
    }

    pub fn spec(&self) -> &OrderSpec {
        &self.spec
    }

    /// Current status: the most recently appended history entry.
    pub fn status(&self) -> OrderStatus {
        self.history
            .last()
            .map(|e| e.status)
            .unwrap_or(OrderStatus::PendingSubmit)
    }

    pub fn history(&self) -> &[StatusEvent] {
        &self.history
    }

    /// Total filled quantity as of the latest status event.
    pub fn cumulative_filled(&self) -> Decimal {
        self.cumulative_filled
    }

    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    pub fn commissions(&self) -> &[CommissionReport] {
        &self.commissions
    }

    pub fn executions_complete(&self) -> bool {
        self.executions_complete
    }

    /// Terminal status *and* end-of-reports signal received.
    pub fn is_settled(&self) -> bool {
        self.status().is_terminal() && self.executions_complete
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn apply_status(&mut self, event: StatusEvent) {
        self.cumulative_filled = event.cumulative_filled;
        self.history.push(event);
    }

    pub(crate) fn apply_execution(&mut self, execution: Execution) {
        self.executions.push(execution);
    }

    pub(crate) fn apply_commission(&mut self, report: CommissionReport) {
        self.commissions.push(report);
    }

    pub(crate) fn complete_executions(&mut self) {
        self.executions_complete = true;
    }
}
