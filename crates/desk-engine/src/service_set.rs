//! Backend capability bundles.

use std::sync::Arc;

use desk_core::{AccountService, Mode, ReplayDriver};
use desk_feed::SubscriptionRegistry;
use desk_orders::OrderLedger;

/// The capabilities of one backend plus the coordination state bound to it.
///
/// Each mode owns its own registry and ledger: the ledger lives for the
/// whole session as the audit trail of that backend's orders.
pub struct ServiceSet {
    pub account: Arc<dyn AccountService>,
    pub feeds: Arc<SubscriptionRegistry>,
    pub orders: Arc<OrderLedger>,
    /// Present only for backends with a steppable simulated clock
    pub driver: Option<Arc<dyn ReplayDriver>>,
}

impl ServiceSet {
    pub fn new(
        account: Arc<dyn AccountService>,
        feeds: Arc<SubscriptionRegistry>,
        orders: Arc<OrderLedger>,
    ) -> Self {
        Self {
            account,
            feeds,
            orders,
            driver: None,
        }
    }

    pub fn with_driver(mut self, driver: Arc<dyn ReplayDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// No active feeds and no working orders: safe to switch away from.
    pub(crate) fn is_quiesced(&self) -> bool {
        self.feeds.active_feeds() == 0 && !self.orders.has_open_orders()
    }
}

/// Every backend variant available to the dispatcher.
pub struct ModeSets {
    pub live: Option<ServiceSet>,
    pub backtest: Option<ServiceSet>,
}

impl ModeSets {
    pub fn new(live: Option<ServiceSet>, backtest: Option<ServiceSet>) -> Self {
        Self { live, backtest }
    }

    /// A session with only the simulator configured.
    pub fn backtest_only(backtest: ServiceSet) -> Self {
        Self {
            live: None,
            backtest: Some(backtest),
        }
    }

    pub(crate) fn get(&self, mode: Mode) -> Option<&ServiceSet> {
        match mode {
            Mode::Live => self.live.as_ref(),
            Mode::Backtest => self.backtest.as_ref(),
        }
    }
}
