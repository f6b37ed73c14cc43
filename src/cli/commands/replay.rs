//! Deterministic replay session.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use desk_backtest::{HistoricalData, SimConfig, Simulator};
use desk_config::load_config;
use desk_core::{BarInterval, Candle, ConsumerId, FeedKey, IntervalUnit, Mode, OrderSpec, Side};
use desk_engine::{Engine, ModeSets, ServiceSet};
use desk_feed::SubscriptionRegistry;
use desk_orders::OrderLedger;
use rust_decimal::Decimal;
use tracing::info;

use crate::cli::ReplayArgs;

const MINUTE_MS: i64 = 60_000;

/// Run a scripted end-to-end session against the simulator: subscribe,
/// step the clock through the dataset, poll candles, fill one market
/// order, and report the account at the end.
pub fn run(args: ReplayArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let key = FeedKey::stock(args.symbol.clone());

    let data = HistoricalData::new(MINUTE_MS).add_series(key.clone(), synthetic_bars(args.bars));
    let sim = Arc::new(Simulator::new(
        data,
        SimConfig {
            account: config.backtest.account.clone(),
            initial_capital: config.backtest.initial_capital,
            commission_per_share: config.backtest.commission_per_share,
        },
    ));
    let registry = Arc::new(SubscriptionRegistry::new(sim.clone()));
    let ledger = Arc::new(OrderLedger::new(sim.clone()));
    sim.attach(&registry, &ledger);
    let set = ServiceSet::new(sim.clone(), registry, ledger).with_driver(sim);

    let runtime = tokio::runtime::Runtime::new()?;
    let engine = Engine::start(
        ModeSets::backtest_only(set),
        Mode::Backtest,
        runtime.handle().clone(),
    )?;
    let handle = engine.handle();
    let me = ConsumerId::from("cli");

    handle.subscribe(me.clone(), key.clone())?;
    info!(%key, bars = args.bars, "replay session started");

    let record = handle.place_order(
        me.clone(),
        OrderSpec::market(key.clone(), Side::Buy, Decimal::from(args.quantity)),
    )?;

    let interval = BarInterval::of(1, IntervalUnit::Minute);
    let mut candles: Vec<Candle> = Vec::new();
    while handle.step_backtest()? {
        candles.extend(handle.read_candles(me.clone(), key.clone(), interval)?);
    }

    let order = record.lock().unwrap().clone();
    info!(
        status = %order.status(),
        filled = %order.cumulative_filled(),
        executions = order.executions().len(),
        "order settled"
    );

    let summary = handle.account_summary()?;
    let pnl = handle.account_pnl()?;
    info!(
        candles = candles.len(),
        cash = %summary.cash,
        equity = %summary.equity,
        realized = %pnl.realized,
        unrealized = %pnl.unrealized,
        "replay finished"
    );

    handle.unsubscribe(me, key)?;
    engine.shutdown();
    Ok(())
}

/// Deterministic synthetic one-minute bars: a slow sine drift, no
/// randomness, so repeated runs replay identically.
fn synthetic_bars(count: u32) -> Vec<Candle> {
    let mut price = 100.0_f64;
    (0..count)
        .map(|i| {
            let drift = (i as f64 * 0.7).sin() * 1.5;
            let open = price;
            let close = (open + drift).max(1.0);
            let high = open.max(close) + 0.5;
            let low = (open.min(close) - 0.5).max(0.5);
            price = close;
            Candle::new(i as i64 * MINUTE_MS, open, high, low, close, 1_000.0)
        })
        .collect()
}
