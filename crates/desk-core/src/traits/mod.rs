//! Capability traits implemented by the execution backends.

mod account;
mod market_data;
mod order_router;
mod persistence;
mod replay;

pub use account::AccountService;
pub use market_data::MarketDataService;
pub use order_router::OrderRouter;
pub use persistence::EntityStore;
pub use replay::ReplayDriver;
