//! Persistence collaborator boundary.

use crate::error::StoreError;
use crate::types::{FeedKey, ParameterSet};
use async_trait::async_trait;
use serde_json::Value;

/// Entity storage consumed, never implemented, by this engine.
///
/// Order snapshots cross the boundary as JSON values so the store does not
/// depend on ledger internals.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load the persisted instrument watchlist.
    async fn load_watchlist(&self) -> Result<Vec<FeedKey>, StoreError>;

    /// Replace the persisted instrument watchlist.
    async fn save_watchlist(&self, keys: &[FeedKey]) -> Result<(), StoreError>;

    /// Persist a point-in-time order snapshot for audit.
    async fn save_order_snapshot(&self, snapshot: &Value) -> Result<(), StoreError>;

    /// Load a named strategy parameter set.
    async fn load_parameter_set(&self, name: &str) -> Result<ParameterSet, StoreError>;

    /// Persist a strategy parameter set.
    async fn save_parameter_set(&self, params: &ParameterSet) -> Result<(), StoreError>;
}
