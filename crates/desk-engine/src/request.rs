//! Typed engine requests.

use std::sync::mpsc::SyncSender;

use desk_core::{
    AccountPnl, AccountSnapshot, BarInterval, Candle, ConsumerId, EngineResult, FeedHandle,
    FeedKey, Mode, OrderId, OrderSpec, Position, PositionPnl,
};
use desk_orders::{OrderRecord, SharedOrderRecord};

/// Bounded completion channel delivered back to the blocked caller.
pub(crate) type Reply<T> = SyncSender<EngineResult<T>>;

/// One unit of work for the dispatcher thread.
///
/// Each variant carries its parameters plus the reply channel the
/// submitting thread is blocked on. Requests are immutable once built and
/// owned by the dispatcher from submission to completion.
pub(crate) enum EngineRequest {
    AccountSummary {
        reply: Reply<AccountSnapshot>,
    },
    AccountPnl {
        reply: Reply<AccountPnl>,
    },
    Positions {
        reply: Reply<Vec<Position>>,
    },
    PositionPnl {
        position: Position,
        reply: Reply<PositionPnl>,
    },
    Subscribe {
        consumer: ConsumerId,
        key: FeedKey,
        reply: Reply<FeedHandle>,
    },
    ReadCandles {
        consumer: ConsumerId,
        key: FeedKey,
        interval: BarInterval,
        reply: Reply<Vec<Candle>>,
    },
    Unsubscribe {
        consumer: ConsumerId,
        key: FeedKey,
        reply: Reply<()>,
    },
    PlaceOrder {
        owner: ConsumerId,
        spec: OrderSpec,
        reply: Reply<SharedOrderRecord>,
    },
    CancelOrder {
        id: OrderId,
        reply: Reply<()>,
    },
    OpenOrders {
        owner: ConsumerId,
        reply: Reply<Vec<OrderRecord>>,
    },
    SwitchMode {
        mode: Mode,
        reply: Reply<()>,
    },
    StepBacktest {
        reply: Reply<bool>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

impl EngineRequest {
    /// Request kind for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            EngineRequest::AccountSummary { .. } => "account_summary",
            EngineRequest::AccountPnl { .. } => "account_pnl",
            EngineRequest::Positions { .. } => "positions",
            EngineRequest::PositionPnl { .. } => "position_pnl",
            EngineRequest::Subscribe { .. } => "subscribe",
            EngineRequest::ReadCandles { .. } => "read_candles",
            EngineRequest::Unsubscribe { .. } => "unsubscribe",
            EngineRequest::PlaceOrder { .. } => "place_order",
            EngineRequest::CancelOrder { .. } => "cancel_order",
            EngineRequest::OpenOrders { .. } => "open_orders",
            EngineRequest::SwitchMode { .. } => "switch_mode",
            EngineRequest::StepBacktest { .. } => "step_backtest",
            EngineRequest::Shutdown { .. } => "shutdown",
        }
    }
}
