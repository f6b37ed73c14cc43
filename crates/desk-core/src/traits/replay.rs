//! Simulated-time driver capability.

use crate::error::BrokerError;

/// Advances a simulated backend by one event.
///
/// Only the backtest backend implements this; its clock moves exclusively
/// through `step_once`, never with wall-clock time.
pub trait ReplayDriver: Send + Sync {
    /// Process the next historical bar. Returns `false` once the dataset
    /// is exhausted.
    fn step_once(&self) -> Result<bool, BrokerError>;
}
