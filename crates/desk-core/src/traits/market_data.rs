//! Broker-level market-data capability.

use crate::error::BrokerError;
use crate::types::{FeedHandle, FeedKey};
use async_trait::async_trait;

/// One broker-level feed per unique [`FeedKey`].
///
/// This is the backend side of the subscription registry: the registry
/// opens at most one feed per key regardless of how many consumers read
/// it, and closes the feed when the last consumer unsubscribes. Samples do
/// not flow through this trait; the backend pushes them into the
/// registry's ingestion path (live callback pump or simulator step).
#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Open a feed and return the backend-assigned handle.
    async fn open_feed(&self, key: &FeedKey) -> Result<FeedHandle, BrokerError>;

    /// Release a feed previously opened for `key`.
    async fn close_feed(&self, key: &FeedKey, handle: FeedHandle) -> Result<(), BrokerError>;
}
