//! Backend-to-engine event stream.

use serde::{Deserialize, Serialize};

use super::{CommissionReport, Execution, FeedHandle, OrderId, PriceSample, StatusEvent};

/// An event pushed by a backend's ingestion side.
///
/// Live backends emit these from the vendor callback thread; the backtest
/// simulator pushes the equivalents synchronously while stepping. Ticks are
/// routed by feed handle because that is all the vendor wire carries; order
/// events are keyed by the ledger's own order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BrokerEvent {
    Tick {
        handle: FeedHandle,
        sample: PriceSample,
    },
    OrderStatus {
        id: OrderId,
        event: StatusEvent,
    },
    Execution {
        id: OrderId,
        execution: Execution,
    },
    Commission {
        id: OrderId,
        report: CommissionReport,
    },
    /// Explicit end-of-reports signal: no further executions will arrive
    /// for this order.
    ExecutionsComplete {
        id: OrderId,
    },
}
