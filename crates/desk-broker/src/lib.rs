//! Live broker backend.
//!
//! The wire protocol lives in the vendor client behind
//! [`BrokerConnection`]; this crate adapts that boundary to the engine's
//! capability traits and pumps the vendor's callback events into the
//! subscription registry and order ledger.

mod connection;
mod live;

pub use connection::BrokerConnection;
pub use live::{spawn_event_pump, LiveBroker};
