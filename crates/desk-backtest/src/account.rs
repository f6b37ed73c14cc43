//! Simulated account state.

use chrono::{DateTime, Utc};
use desk_core::{AccountPnl, AccountSnapshot, FeedKey, Position, PositionPnl, Side};
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One simulated position.
#[derive(Debug, Clone)]
struct SimPosition {
    quantity: Decimal,
    avg_cost: Decimal,
    last_price: Decimal,
    realized: Decimal,
}

impl SimPosition {
    fn new() -> Self {
        Self {
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            last_price: Decimal::ZERO,
            realized: Decimal::ZERO,
        }
    }

    fn unrealized(&self) -> Decimal {
        (self.last_price - self.avg_cost) * self.quantity
    }

    /// Apply one fill; returns the realized P&L of any closed portion.
    fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let fill_qty = side.sign() * quantity;
        let mut realized = Decimal::ZERO;

        let same_direction = self.quantity.is_zero()
            || (self.quantity > Decimal::ZERO) == (fill_qty > Decimal::ZERO);

        if same_direction {
            let total_cost = self.quantity * self.avg_cost + fill_qty * price;
            self.quantity += fill_qty;
            if !self.quantity.is_zero() {
                self.avg_cost = total_cost / self.quantity;
            }
        } else {
            let close_qty = fill_qty.abs().min(self.quantity.abs());
            realized = if self.quantity > Decimal::ZERO {
                close_qty * (price - self.avg_cost)
            } else {
                close_qty * (self.avg_cost - price)
            };
            self.realized += realized;

            let remaining = fill_qty.abs() - close_qty;
            if remaining > Decimal::ZERO {
                // Position reversed through zero
                self.quantity = fill_qty.signum() * remaining;
                self.avg_cost = price;
            } else {
                self.quantity += fill_qty;
            }
        }

        self.last_price = price;
        realized
    }
}

/// Cash and positions for the simulated session.
#[derive(Debug)]
pub(crate) struct SimAccount {
    account: String,
    cash: Decimal,
    positions: HashMap<FeedKey, SimPosition>,
}

impl SimAccount {
    pub(crate) fn new(account: String, initial_capital: Decimal) -> Self {
        Self {
            account,
            cash: initial_capital,
            positions: HashMap::new(),
        }
    }

    pub(crate) fn apply_fill(
        &mut self,
        key: &FeedKey,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
    ) {
        let value = quantity * price;
        match side {
            Side::Buy => self.cash -= value + commission,
            Side::Sell => self.cash += value - commission,
        }
        self.positions
            .entry(key.clone())
            .or_insert_with(SimPosition::new)
            .apply_fill(side, quantity, price);
    }

    /// Update the mark price for one instrument.
    pub(crate) fn mark(&mut self, key: &FeedKey, price: Decimal) {
        if let Some(position) = self.positions.get_mut(key) {
            position.last_price = price;
        }
    }

    fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.quantity * p.last_price)
                .sum::<Decimal>()
    }

    pub(crate) fn snapshot(&self, timestamp: DateTime<Utc>) -> AccountSnapshot {
        AccountSnapshot {
            account: self.account.clone(),
            cash: self.cash,
            equity: self.equity(),
            buying_power: self.cash,
            timestamp,
        }
    }

    pub(crate) fn pnl(&self) -> AccountPnl {
        AccountPnl {
            realized: self.positions.values().map(|p| p.realized).sum(),
            unrealized: self.positions.values().map(|p| p.unrealized()).sum(),
        }
    }

    pub(crate) fn positions(&self) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|(_, p)| !p.quantity.is_zero())
            .map(|(key, p)| Position {
                instrument: key.clone(),
                quantity: p.quantity,
                avg_cost: p.avg_cost,
                market_price: p.last_price,
            })
            .collect()
    }

    pub(crate) fn position_pnl(&self, position: &Position) -> PositionPnl {
        let (unrealized, realized) = self
            .positions
            .get(&position.instrument)
            .map(|p| (p.unrealized(), p.realized))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        PositionPnl {
            instrument: position.instrument.clone(),
            unrealized,
            realized,
        }
    }
}
