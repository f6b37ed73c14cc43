//! The backtest simulator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use desk_core::{
    AccountPnl, AccountSnapshot, AccountService, BrokerError, Candle, CommissionReport, Execution,
    FeedHandle, FeedKey, MarketDataService, OrderId, OrderRouter, OrderSpec, OrderStatus,
    OrderType, Position, PositionPnl, PriceSample, ReplayDriver, Side, StatusEvent,
};
use desk_feed::SubscriptionRegistry;
use desk_orders::OrderLedger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;
use uuid::Uuid;

use crate::account::SimAccount;
use crate::clock::SimClock;
use crate::dataset::HistoricalData;

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Account identifier reported in snapshots
    pub account: String,
    /// Starting cash
    pub initial_capital: Decimal,
    /// Flat commission charged per share
    pub commission_per_share: Decimal,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            account: "SIM".to_string(),
            initial_capital: dec!(100000),
            commission_per_share: Decimal::ZERO,
        }
    }
}

struct PendingOrder {
    id: OrderId,
    spec: OrderSpec,
}

/// Back-references into the registry and ledger the simulator feeds.
///
/// Held weakly: the registry and ledger own the simulator through the
/// capability traits, not the other way around.
#[derive(Clone)]
struct Sinks {
    registry: Weak<SubscriptionRegistry>,
    ledger: Weak<OrderLedger>,
}

/// Deterministic execution backend driven by stored candlesticks.
///
/// Implements every capability trait of the live broker. The clock moves
/// only when [`ReplayDriver::step_once`] is called; each step replays the
/// next chronological bar for every instrument due at that time, pushes
/// its samples into the subscription registry, and resolves resting orders
/// against the bar.
pub struct Simulator {
    data: HistoricalData,
    clock: SimClock,
    commission_per_share: Decimal,
    account: Mutex<SimAccount>,
    /// Active backend feeds by key
    feeds: Mutex<HashMap<FeedKey, FeedHandle>>,
    /// Next bar index per instrument; never rewinds, even across
    /// unsubscribe/resubscribe
    replay_index: Mutex<HashMap<FeedKey, usize>>,
    pending: Mutex<Vec<PendingOrder>>,
    sinks: Mutex<Option<Sinks>>,
    next_handle: AtomicU64,
}

impl Simulator {
    pub fn new(data: HistoricalData, config: SimConfig) -> Self {
        let start = data.earliest_start_ms().unwrap_or(0);
        Self {
            data,
            clock: SimClock::new(start),
            commission_per_share: config.commission_per_share,
            account: Mutex::new(SimAccount::new(config.account, config.initial_capital)),
            feeds: Mutex::new(HashMap::new()),
            replay_index: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            sinks: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Wire the simulator to the registry and ledger it pushes events into.
    /// Must be called before the first order or step.
    pub fn attach(&self, registry: &Arc<SubscriptionRegistry>, ledger: &Arc<OrderLedger>) {
        *self.sinks.lock().unwrap() = Some(Sinks {
            registry: Arc::downgrade(registry),
            ledger: Arc::downgrade(ledger),
        });
    }

    /// Current simulated time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn sinks(&self) -> Result<(Arc<SubscriptionRegistry>, Arc<OrderLedger>), BrokerError> {
        let guard = self.sinks.lock().unwrap();
        let sinks = guard
            .as_ref()
            .ok_or_else(|| BrokerError::Unavailable("simulator not attached".into()))?;
        match (sinks.registry.upgrade(), sinks.ledger.upgrade()) {
            (Some(registry), Some(ledger)) => Ok((registry, ledger)),
            _ => Err(BrokerError::Unavailable("session torn down".into())),
        }
    }

    /// Instruments whose next bar should be considered: everything with an
    /// open feed plus everything with a resting order.
    fn scan_keys(&self) -> Vec<FeedKey> {
        let mut keys: Vec<FeedKey> = self.feeds.lock().unwrap().keys().cloned().collect();
        for order in self.pending.lock().unwrap().iter() {
            if !keys.contains(&order.spec.instrument) {
                keys.push(order.spec.instrument.clone());
            }
        }
        keys
    }

    /// Replay the next chronological bar. Returns `false` when no
    /// subscribed or order-bearing instrument has data left.
    fn step(&self) -> Result<bool, BrokerError> {
        let (registry, ledger) = self.sinks()?;
        let width = self.data.bar_width_ms();

        // Pick the earliest next bar across all instruments of interest.
        let due: Vec<(FeedKey, Candle)> = {
            let mut index = self.replay_index.lock().unwrap();
            let keys = self.scan_keys();
            let next_start = keys
                .iter()
                .filter_map(|key| {
                    let i = *index.get(key).unwrap_or(&0);
                    self.data.series(key).and_then(|bars| bars.get(i))
                })
                .map(|bar| bar.start_ms)
                .min();
            let Some(start) = next_start else {
                return Ok(false);
            };
            keys.iter()
                .filter_map(|key| {
                    let slot = index.entry(key.clone()).or_insert(0);
                    let bar = *self.data.series(key)?.get(*slot)?;
                    if bar.start_ms == start {
                        *slot += 1;
                        Some((key.clone(), bar))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let start = due[0].1.start_ms;
        self.clock.advance_to(start);
        let now = self.clock.now();

        // Feed samples for instruments with an open feed.
        let feeds = self.feeds.lock().unwrap().clone();
        for (key, bar) in &due {
            if feeds.contains_key(key) {
                for sample in bar_samples(bar, width) {
                    registry.ingest(key, sample);
                }
            }
        }

        // Resolve resting orders against the replayed bars.
        let filled: Vec<(PendingOrder, Decimal)> = {
            let mut pending = self.pending.lock().unwrap();
            let mut keep = Vec::new();
            let mut filled = Vec::new();
            for order in pending.drain(..) {
                let bar = due.iter().find(|(k, _)| *k == order.spec.instrument);
                match bar.and_then(|(_, bar)| fill_price(&order.spec, bar)) {
                    Some(price) => filled.push((order, price)),
                    None => keep.push(order),
                }
            }
            *pending = keep;
            filled
        };

        for (order, price) in filled {
            let quantity = order.spec.quantity;
            let commission = self.commission_per_share * quantity;
            self.account.lock().unwrap().apply_fill(
                &order.spec.instrument,
                order.spec.side,
                quantity,
                price,
                commission,
            );

            debug!(id = %order.id, %price, %quantity, "simulated fill");
            let exec_id = Uuid::from_u128(order.id.0 as u128);
            ledger.record_status(order.id, StatusEvent::new(OrderStatus::Filled, quantity, now));
            ledger.record_execution(
                order.id,
                Execution {
                    exec_id,
                    price,
                    quantity,
                    timestamp: now,
                },
            );
            ledger.record_commission(
                order.id,
                CommissionReport {
                    exec_id,
                    amount: commission,
                    currency: order.spec.instrument.currency.clone(),
                },
            );
            ledger.mark_executions_complete(order.id);
        }

        // Mark positions at the replayed closes.
        {
            let mut account = self.account.lock().unwrap();
            for (key, bar) in &due {
                account.mark(key, decimal(bar.close));
            }
        }

        self.clock.advance_to(start + width);
        Ok(true)
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default()
}

/// Four deterministic samples per bar, in open/high/low/close order at
/// fixed offsets, volume attributed to the close.
fn bar_samples(bar: &Candle, width: i64) -> [PriceSample; 4] {
    [
        PriceSample::new(bar.start_ms, bar.open, 0.0),
        PriceSample::new(bar.start_ms + width / 4, bar.high, 0.0),
        PriceSample::new(bar.start_ms + width / 2, bar.low, 0.0),
        PriceSample::new(bar.start_ms + width - 1, bar.close, bar.volume),
    ]
}

/// Pure fill resolution: market at the bar's open; limit when the limit
/// price lies within the bar's range, at the open if the bar opens through
/// the limit, otherwise at the limit itself.
fn fill_price(spec: &OrderSpec, bar: &Candle) -> Option<Decimal> {
    let open = decimal(bar.open);
    match spec.order_type {
        OrderType::Market => Some(open),
        OrderType::Limit => {
            let limit = spec.limit_price?;
            match spec.side {
                Side::Buy => {
                    if open <= limit {
                        Some(open)
                    } else if decimal(bar.low) <= limit {
                        Some(limit)
                    } else {
                        None
                    }
                }
                Side::Sell => {
                    if open >= limit {
                        Some(open)
                    } else if decimal(bar.high) >= limit {
                        Some(limit)
                    } else {
                        None
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MarketDataService for Simulator {
    async fn open_feed(&self, key: &FeedKey) -> Result<FeedHandle, BrokerError> {
        if !self.data.contains(key) {
            return Err(BrokerError::Api(format!("no historical series for {}", key)));
        }
        let handle = FeedHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.feeds.lock().unwrap().insert(key.clone(), handle);
        self.replay_index.lock().unwrap().entry(key.clone()).or_insert(0);
        Ok(handle)
    }

    async fn close_feed(&self, key: &FeedKey, _handle: FeedHandle) -> Result<(), BrokerError> {
        self.feeds.lock().unwrap().remove(key);
        Ok(())
    }
}

#[async_trait]
impl OrderRouter for Simulator {
    async fn place(&self, id: OrderId, spec: &OrderSpec) -> Result<(), BrokerError> {
        if !self.data.contains(&spec.instrument) {
            return Err(BrokerError::Rejected(format!(
                "no historical series for {}",
                spec.instrument
            )));
        }
        let (_, ledger) = self.sinks()?;
        ledger.record_status(
            id,
            StatusEvent::new(OrderStatus::Submitted, Decimal::ZERO, self.clock.now()),
        );
        self.pending.lock().unwrap().push(PendingOrder {
            id,
            spec: spec.clone(),
        });
        Ok(())
    }

    async fn cancel(&self, id: OrderId) -> Result<(), BrokerError> {
        let removed = {
            let mut pending = self.pending.lock().unwrap();
            let position = pending.iter().position(|o| o.id == id);
            position.map(|i| pending.remove(i))
        };
        if removed.is_none() {
            return Err(BrokerError::Rejected(format!("{} is not working", id)));
        }

        // Confirmation is synchronous here; asynchrony is a live-backend
        // property and would cost reproducibility.
        let (_, ledger) = self.sinks()?;
        let now = self.clock.now();
        ledger.record_status(id, StatusEvent::new(OrderStatus::PendingCancel, Decimal::ZERO, now));
        ledger.record_status(id, StatusEvent::new(OrderStatus::Cancelled, Decimal::ZERO, now));
        ledger.mark_executions_complete(id);
        Ok(())
    }
}

#[async_trait]
impl AccountService for Simulator {
    async fn summary(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(self.account.lock().unwrap().snapshot(self.clock.now()))
    }

    async fn pnl(&self) -> Result<AccountPnl, BrokerError> {
        Ok(self.account.lock().unwrap().pnl())
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(self.account.lock().unwrap().positions())
    }

    async fn position_pnl(&self, position: &Position) -> Result<PositionPnl, BrokerError> {
        Ok(self.account.lock().unwrap().position_pnl(position))
    }
}

impl ReplayDriver for Simulator {
    fn step_once(&self) -> Result<bool, BrokerError> {
        self.step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_core::{BarInterval, ConsumerId, IntervalUnit};

    const MINUTE: i64 = 60_000;

    fn bars() -> Vec<Candle> {
        vec![
            Candle::new(0, 100.0, 102.0, 99.0, 101.0, 500.0),
            Candle::new(MINUTE, 101.0, 104.0, 100.0, 103.0, 600.0),
            Candle::new(2 * MINUTE, 103.0, 105.0, 95.0, 96.0, 700.0),
            Candle::new(3 * MINUTE, 96.0, 98.0, 94.0, 97.0, 400.0),
        ]
    }

    fn rig() -> (Arc<Simulator>, Arc<SubscriptionRegistry>, Arc<OrderLedger>) {
        let data =
            HistoricalData::new(MINUTE).add_series(FeedKey::stock("AAPL"), bars());
        let sim = Arc::new(Simulator::new(data, SimConfig::default()));
        let registry = Arc::new(SubscriptionRegistry::new(sim.clone()));
        let ledger = Arc::new(OrderLedger::new(sim.clone()));
        sim.attach(&registry, &ledger);
        (sim, registry, ledger)
    }

    #[tokio::test]
    async fn test_market_order_fills_at_next_bar_open() {
        let (sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        let record = ledger
            .place(&owner, OrderSpec::market(key, Side::Buy, dec!(10)))
            .await
            .unwrap();
        assert_eq!(record.lock().unwrap().status(), OrderStatus::Submitted);

        assert!(sim.step_once().unwrap());

        let record = record.lock().unwrap();
        assert_eq!(record.status(), OrderStatus::Filled);
        assert_eq!(record.cumulative_filled(), dec!(10));
        assert_eq!(record.executions()[0].price, dec!(100));
        assert!(record.is_settled());
    }

    #[tokio::test]
    async fn test_limit_buy_waits_for_touch() {
        let (sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        // Touches only in the third bar (low 95).
        let record = ledger
            .place(&owner, OrderSpec::limit(key, Side::Buy, dec!(10), dec!(96)))
            .await
            .unwrap();

        sim.step_once().unwrap();
        sim.step_once().unwrap();
        assert_eq!(record.lock().unwrap().status(), OrderStatus::Submitted);

        sim.step_once().unwrap();
        let record = record.lock().unwrap();
        assert_eq!(record.status(), OrderStatus::Filled);
        assert_eq!(record.executions()[0].price, dec!(96));
    }

    #[tokio::test]
    async fn test_limit_fills_at_open_when_gapped_through() {
        let (sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        // First bar opens at 100, below the 110 buy limit.
        let record = ledger
            .place(&owner, OrderSpec::limit(key, Side::Buy, dec!(5), dec!(110)))
            .await
            .unwrap();
        sim.step_once().unwrap();
        assert_eq!(record.lock().unwrap().executions()[0].price, dec!(100));
    }

    #[tokio::test]
    async fn test_unreachable_limit_never_fills() {
        let (sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        let record = ledger
            .place(&owner, OrderSpec::limit(key, Side::Buy, dec!(5), dec!(90)))
            .await
            .unwrap();
        while sim.step_once().unwrap() {}
        assert_eq!(record.lock().unwrap().status(), OrderStatus::Submitted);
        assert!(ledger.has_open_orders());
    }

    #[tokio::test]
    async fn test_cancel_confirms_and_settles() {
        let (_sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        let record = ledger
            .place(&owner, OrderSpec::limit(key, Side::Buy, dec!(5), dec!(90)))
            .await
            .unwrap();
        let id = record.lock().unwrap().id();
        ledger.cancel(id).await.unwrap();

        let record = record.lock().unwrap();
        assert_eq!(record.status(), OrderStatus::Cancelled);
        let statuses: Vec<OrderStatus> = record.history().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::PendingSubmit,
                OrderStatus::Submitted,
                OrderStatus::PendingCancel,
                OrderStatus::Cancelled,
            ]
        );
        assert!(record.is_settled());
    }

    #[tokio::test]
    async fn test_account_tracks_fill_and_mark() {
        let (sim, _registry, ledger) = rig();
        let owner = ConsumerId::from("bt");
        let key = FeedKey::stock("AAPL");

        ledger
            .place(&owner, OrderSpec::market(key.clone(), Side::Buy, dec!(10)))
            .await
            .unwrap();
        sim.step_once().unwrap();

        let snapshot = sim.summary().await.unwrap();
        assert_eq!(snapshot.cash, dec!(99000));
        // Marked at the first bar's close of 101.
        assert_eq!(snapshot.equity, dec!(100010));

        let positions = sim.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(10));

        let pnl = sim.position_pnl(&positions[0]).await.unwrap();
        assert_eq!(pnl.unrealized, dec!(10));
    }

    #[tokio::test]
    async fn test_feed_steps_into_registry() {
        let (sim, registry, _ledger) = rig();
        let consumer = ConsumerId::from("chart");
        let key = FeedKey::stock("AAPL");

        registry.subscribe(&consumer, &key).await.unwrap();
        // Three bars closes two one-minute buckets.
        for _ in 0..3 {
            sim.step_once().unwrap();
        }

        let candles = registry
            .read(&consumer, &key, BarInterval::of(1, IntervalUnit::Minute))
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].high, 102.0);
        assert_eq!(candles[0].low, 99.0);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[0].volume, 500.0);
        assert_eq!(candles[1].close, 103.0);
    }

    #[tokio::test]
    async fn test_replay_is_deterministic() {
        let run = || async {
            let (sim, registry, _ledger) = rig();
            let consumer = ConsumerId::from("chart");
            let key = FeedKey::stock("AAPL");
            registry.subscribe(&consumer, &key).await.unwrap();

            let mut collected = Vec::new();
            while sim.step_once().unwrap() {
                collected.extend(
                    registry
                        .read(&consumer, &key, BarInterval::of(1, IntervalUnit::Minute))
                        .unwrap(),
                );
            }
            collected
        };

        let first = run().await;
        let second = run().await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_step_exhausts() {
        let (sim, registry, _ledger) = rig();
        let consumer = ConsumerId::from("chart");
        registry
            .subscribe(&consumer, &FeedKey::stock("AAPL"))
            .await
            .unwrap();

        let mut steps = 0;
        while sim.step_once().unwrap() {
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert!(!sim.step_once().unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_series_is_refused() {
        let (_sim, registry, _ledger) = rig();
        let err = registry
            .subscribe(&ConsumerId::from("chart"), &FeedKey::stock("TSLA"))
            .await
            .unwrap_err();
        assert!(matches!(err, desk_core::EngineError::Broker(_)));
    }
}
