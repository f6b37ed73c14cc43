//! The dispatcher thread.

use std::sync::mpsc::{channel, sync_channel, Receiver, Sender};
use std::thread::JoinHandle;

use desk_core::{EngineError, EngineResult, Mode};
use tracing::{debug, info, warn};

use crate::handle::EngineHandle;
use crate::request::EngineRequest;
use crate::service_set::{ModeSets, ServiceSet};

/// The running engine.
///
/// Owns the dispatcher thread. Dropping (or calling [`Engine::shutdown`])
/// drains the queue up to the shutdown request and joins the thread.
pub struct Engine {
    tx: Sender<EngineRequest>,
    thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Spawn the dispatcher thread over the configured backends.
    ///
    /// `runtime` is borrowed for blocking on the backends' async calls;
    /// the engine never owns it.
    pub fn start(
        sets: ModeSets,
        initial: Mode,
        runtime: tokio::runtime::Handle,
    ) -> EngineResult<Self> {
        if sets.get(initial).is_none() {
            return Err(EngineError::Config(format!(
                "initial mode {} is not configured",
                initial
            )));
        }

        let (tx, rx) = channel();
        let thread = std::thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || {
                Dispatcher {
                    sets,
                    mode: initial,
                    runtime,
                }
                .run(rx)
            })
            .map_err(|e| EngineError::Config(format!("failed to spawn dispatcher: {}", e)))?;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// A cloneable handle for submitting requests from any thread.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop the dispatcher and wait for the thread to finish.
    pub fn shutdown(mut self) {
        let _ = self.handle().shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let (reply, _done) = sync_channel(1);
            let _ = self.tx.send(EngineRequest::Shutdown { reply });
            let _ = thread.join();
        }
    }
}

struct Dispatcher {
    sets: ModeSets,
    mode: Mode,
    runtime: tokio::runtime::Handle,
}

impl Dispatcher {
    fn run(mut self, rx: Receiver<EngineRequest>) {
        info!(mode = %self.mode, "dispatcher started");
        // Strict FIFO: one request at a time, in submission order. A
        // failing request reaches only its own caller; the loop goes on.
        while let Ok(request) = rx.recv() {
            debug!(request = request.name(), mode = %self.mode, "dispatching");
            if self.dispatch(request) {
                break;
            }
        }
        info!("dispatcher stopped");
    }

    /// Active service set; the mode invariant is enforced at start and on
    /// every switch.
    fn active(&self) -> &ServiceSet {
        self.sets.get(self.mode).expect("active mode is configured")
    }

    /// Execute one request and deliver its result. Returns `true` on
    /// shutdown. A caller that gave up waiting is ignored.
    fn dispatch(&mut self, request: EngineRequest) -> bool {
        match request {
            EngineRequest::AccountSummary { reply } => {
                let result = self.runtime.block_on(self.active().account.summary());
                let _ = reply.send(result.map_err(Into::into));
            }
            EngineRequest::AccountPnl { reply } => {
                let result = self.runtime.block_on(self.active().account.pnl());
                let _ = reply.send(result.map_err(Into::into));
            }
            EngineRequest::Positions { reply } => {
                let result = self.runtime.block_on(self.active().account.positions());
                let _ = reply.send(result.map_err(Into::into));
            }
            EngineRequest::PositionPnl { position, reply } => {
                let result = self
                    .runtime
                    .block_on(self.active().account.position_pnl(&position));
                let _ = reply.send(result.map_err(Into::into));
            }
            EngineRequest::Subscribe {
                consumer,
                key,
                reply,
            } => {
                let result = self
                    .runtime
                    .block_on(self.active().feeds.subscribe(&consumer, &key));
                let _ = reply.send(result);
            }
            EngineRequest::ReadCandles {
                consumer,
                key,
                interval,
                reply,
            } => {
                let _ = reply.send(self.active().feeds.read(&consumer, &key, interval));
            }
            EngineRequest::Unsubscribe {
                consumer,
                key,
                reply,
            } => {
                let result = self
                    .runtime
                    .block_on(self.active().feeds.unsubscribe(&consumer, &key));
                let _ = reply.send(result);
            }
            EngineRequest::PlaceOrder { owner, spec, reply } => {
                let result = self
                    .runtime
                    .block_on(self.active().orders.place(&owner, spec));
                let _ = reply.send(result);
            }
            EngineRequest::CancelOrder { id, reply } => {
                let result = self.runtime.block_on(self.active().orders.cancel(id));
                let _ = reply.send(result);
            }
            EngineRequest::OpenOrders { owner, reply } => {
                let _ = reply.send(Ok(self.active().orders.open_orders(&owner)));
            }
            EngineRequest::SwitchMode { mode, reply } => {
                let _ = reply.send(self.switch_mode(mode));
            }
            EngineRequest::StepBacktest { reply } => {
                let result = match &self.active().driver {
                    Some(driver) => driver.step_once().map_err(Into::into),
                    None => Err(EngineError::InvalidState(format!(
                        "mode {} has no replay driver",
                        self.mode
                    ))),
                };
                let _ = reply.send(result);
            }
            EngineRequest::Shutdown { reply } => {
                let _ = reply.send(Ok(()));
                return true;
            }
        }
        false
    }

    /// Switch the active backend. The FIFO queue guarantees nothing is in
    /// flight; the quiesce check guards against orphaning feeds or
    /// working orders on the backend being left.
    fn switch_mode(&mut self, mode: Mode) -> EngineResult<()> {
        if mode == self.mode {
            return Ok(());
        }
        if self.sets.get(mode).is_none() {
            return Err(EngineError::Config(format!(
                "mode {} is not configured",
                mode
            )));
        }
        if !self.active().is_quiesced() {
            warn!(from = %self.mode, to = %mode, "mode switch refused: backend not quiesced");
            return Err(EngineError::InvalidState(
                "cannot switch mode with active subscriptions or working orders".to_string(),
            ));
        }
        info!(from = %self.mode, to = %mode, "switching backend mode");
        self.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_backtest::{HistoricalData, SimConfig, Simulator};
    use desk_core::{
        BarInterval, Candle, ConsumerId, FeedKey, IntervalUnit, OrderSpec, OrderStatus, Side,
    };
    use desk_feed::SubscriptionRegistry;
    use desk_orders::OrderLedger;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Arc;

    const MINUTE: i64 = 60_000;

    fn bars() -> Vec<Candle> {
        (0..6i64)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::new(i * MINUTE, base, base + 2.0, base - 1.0, base + 1.0, 100.0)
            })
            .collect()
    }

    fn sim_set(with_driver: bool) -> ServiceSet {
        let data = HistoricalData::new(MINUTE).add_series(FeedKey::stock("AAPL"), bars());
        let sim = Arc::new(Simulator::new(data, SimConfig::default()));
        let registry = Arc::new(SubscriptionRegistry::new(sim.clone()));
        let ledger = Arc::new(OrderLedger::new(sim.clone()));
        sim.attach(&registry, &ledger);

        let set = ServiceSet::new(sim.clone(), registry, ledger);
        if with_driver {
            set.with_driver(sim)
        } else {
            set
        }
    }

    fn start_backtest_engine(runtime: &tokio::runtime::Runtime) -> Engine {
        Engine::start(
            ModeSets::backtest_only(sim_set(true)),
            Mode::Backtest,
            runtime.handle().clone(),
        )
        .unwrap()
    }

    #[test]
    fn test_end_to_end_backtest_session() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = start_backtest_engine(&runtime);
        let handle = engine.handle();
        let ui = ConsumerId::from("ui");
        let key = FeedKey::stock("AAPL");

        handle.subscribe(ui.clone(), key.clone()).unwrap();

        // Nothing closed yet; read does not block.
        assert!(handle
            .read_candles(ui.clone(), key.clone(), BarInterval::of(1, IntervalUnit::Minute))
            .unwrap()
            .is_empty());

        let record = handle
            .place_order(ui.clone(), OrderSpec::market(key.clone(), Side::Buy, dec!(10)))
            .unwrap();
        assert_eq!(handle.open_orders(ui.clone()).unwrap().len(), 1);

        for _ in 0..3 {
            assert!(handle.step_backtest().unwrap());
        }

        assert_eq!(record.lock().unwrap().status(), OrderStatus::Filled);
        assert!(handle.open_orders(ui.clone()).unwrap().is_empty());

        let candles = handle
            .read_candles(ui.clone(), key.clone(), BarInterval::of(1, IntervalUnit::Minute))
            .unwrap();
        assert_eq!(candles.len(), 2);

        let summary = handle.account_summary().unwrap();
        assert_eq!(summary.cash, dec!(99000));

        let positions = handle.positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(10));
        let pnl = handle.position_pnl(positions[0].clone()).unwrap();
        assert_eq!(pnl.realized, dec!(0));
        assert_eq!(handle.account_pnl().unwrap().realized, dec!(0));

        handle.unsubscribe(ui, key).unwrap();
        engine.shutdown();
    }

    #[test]
    fn test_submissions_from_many_threads_serialize() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = start_backtest_engine(&runtime);

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let handle = engine.handle();
                std::thread::spawn(move || {
                    let owner = ConsumerId::new(format!("strategy-{}", i));
                    let record = handle
                        .place_order(
                            owner,
                            OrderSpec::market(FeedKey::stock("AAPL"), Side::Buy, dec!(1)),
                        )
                        .unwrap();
                    let id = record.lock().unwrap().id().0;
                    id
                })
            })
            .collect();

        // Each caller got exactly its own order back: ids are the full
        // dense range the ledger allocated, with no duplicates.
        let ids: HashSet<u64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(ids, (1..=8).collect::<HashSet<u64>>());
        engine.shutdown();
    }

    #[test]
    fn test_failing_request_does_not_halt_the_loop() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = start_backtest_engine(&runtime);
        let handle = engine.handle();
        let ui = ConsumerId::from("ui");
        let key = FeedKey::stock("AAPL");

        // Not subscribed: this request fails for its caller alone.
        assert!(handle.unsubscribe(ui.clone(), key.clone()).is_err());
        // An invalid order spec fails validation.
        assert!(handle
            .place_order(ui.clone(), OrderSpec::market(key.clone(), Side::Buy, dec!(0)))
            .is_err());

        // The dispatcher is still serving.
        handle.subscribe(ui.clone(), key.clone()).unwrap();
        handle.unsubscribe(ui, key).unwrap();
        engine.shutdown();
    }

    #[test]
    fn test_mode_switch_requires_quiesce_and_configuration() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = Engine::start(
            ModeSets::new(Some(sim_set(false)), Some(sim_set(true))),
            Mode::Backtest,
            runtime.handle().clone(),
        )
        .unwrap();
        let handle = engine.handle();
        let ui = ConsumerId::from("ui");
        let key = FeedKey::stock("AAPL");

        handle.subscribe(ui.clone(), key.clone()).unwrap();
        let err = handle.switch_mode(Mode::Live).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        handle.unsubscribe(ui.clone(), key.clone()).unwrap();
        handle.switch_mode(Mode::Live).unwrap();

        // The stand-in live set has no replay driver.
        let err = handle.step_backtest().unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        // Switching to the same mode is a no-op.
        handle.switch_mode(Mode::Live).unwrap();
        handle.switch_mode(Mode::Backtest).unwrap();
        engine.shutdown();
    }

    #[test]
    fn test_unconfigured_mode_is_refused() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = start_backtest_engine(&runtime);
        let handle = engine.handle();

        let err = handle.switch_mode(Mode::Live).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = Engine::start(
            ModeSets::backtest_only(sim_set(true)),
            Mode::Live,
            runtime.handle().clone(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Config(_)));
        engine.shutdown();
    }

    #[test]
    fn test_handle_reports_stopped_after_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = start_backtest_engine(&runtime);
        let handle = engine.handle();

        engine.shutdown();
        let err = handle.account_summary().unwrap_err();
        assert!(matches!(err, EngineError::Stopped));
    }
}
