//! Blocking caller facade.

use std::sync::mpsc::{sync_channel, Sender};

use desk_core::{
    AccountPnl, AccountSnapshot, BarInterval, Candle, ConsumerId, EngineError, EngineResult,
    FeedHandle, FeedKey, Mode, OrderId, OrderSpec, Position, PositionPnl,
};
use desk_orders::{OrderRecord, SharedOrderRecord};

use crate::request::{EngineRequest, Reply};

/// Cloneable handle for submitting requests from any thread.
///
/// Every method enqueues one typed request and blocks the calling thread
/// until the dispatcher has executed it, returning the result or the
/// request's own failure. Requests from all handles execute in strict
/// submission order.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) tx: Sender<EngineRequest>,
}

impl EngineHandle {
    fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> EngineRequest) -> EngineResult<T> {
        let (reply, result) = sync_channel(1);
        self.tx
            .send(build(reply))
            .map_err(|_| EngineError::Stopped)?;
        result.recv().map_err(|_| EngineError::Stopped)?
    }

    /// Point-in-time account summary from the active backend.
    pub fn account_summary(&self) -> EngineResult<AccountSnapshot> {
        self.submit(|reply| EngineRequest::AccountSummary { reply })
    }

    /// Account-level profit and loss.
    pub fn account_pnl(&self) -> EngineResult<AccountPnl> {
        self.submit(|reply| EngineRequest::AccountPnl { reply })
    }

    /// All open positions.
    pub fn positions(&self) -> EngineResult<Vec<Position>> {
        self.submit(|reply| EngineRequest::Positions { reply })
    }

    /// Profit and loss attributed to one position.
    pub fn position_pnl(&self, position: Position) -> EngineResult<PositionPnl> {
        self.submit(|reply| EngineRequest::PositionPnl { position, reply })
    }

    /// Subscribe `consumer` to a market-data feed.
    pub fn subscribe(&self, consumer: ConsumerId, key: FeedKey) -> EngineResult<FeedHandle> {
        self.submit(|reply| EngineRequest::Subscribe {
            consumer,
            key,
            reply,
        })
    }

    /// Read newly closed candlesticks at the chosen interval. Returns an
    /// empty vector immediately when nothing new has closed; re-poll.
    pub fn read_candles(
        &self,
        consumer: ConsumerId,
        key: FeedKey,
        interval: BarInterval,
    ) -> EngineResult<Vec<Candle>> {
        self.submit(|reply| EngineRequest::ReadCandles {
            consumer,
            key,
            interval,
            reply,
        })
    }

    /// Unsubscribe `consumer` from a feed.
    pub fn unsubscribe(&self, consumer: ConsumerId, key: FeedKey) -> EngineResult<()> {
        self.submit(|reply| EngineRequest::Unsubscribe {
            consumer,
            key,
            reply,
        })
    }

    /// Place an order. Returns the shared record immediately; progress
    /// arrives on the record as backend events do.
    pub fn place_order(
        &self,
        owner: ConsumerId,
        spec: OrderSpec,
    ) -> EngineResult<SharedOrderRecord> {
        self.submit(|reply| EngineRequest::PlaceOrder { owner, spec, reply })
    }

    /// Request cancellation of a working order.
    pub fn cancel_order(&self, id: OrderId) -> EngineResult<()> {
        self.submit(|reply| EngineRequest::CancelOrder { id, reply })
    }

    /// Snapshots of `owner`'s non-terminal orders.
    pub fn open_orders(&self, owner: ConsumerId) -> EngineResult<Vec<OrderRecord>> {
        self.submit(|reply| EngineRequest::OpenOrders { owner, reply })
    }

    /// Switch the active backend. Refused unless the current backend is
    /// quiesced.
    pub fn switch_mode(&self, mode: Mode) -> EngineResult<()> {
        self.submit(|reply| EngineRequest::SwitchMode { mode, reply })
    }

    /// Advance the backtest clock by one bar. Returns `false` once the
    /// dataset is exhausted.
    pub fn step_backtest(&self) -> EngineResult<bool> {
        self.submit(|reply| EngineRequest::StepBacktest { reply })
    }

    /// Stop the dispatcher after the queue ahead of this request drains.
    pub fn shutdown(&self) -> EngineResult<()> {
        self.submit(|reply| EngineRequest::Shutdown { reply })
    }
}
