//! Error types for the coordination engine.

use thiserror::Error;

use crate::types::{ConsumerId, FeedKey, OrderId, OrderStatus};

/// Top-level engine error.
///
/// Every failure produced while executing a request is captured by the
/// dispatcher and delivered to the one caller that submitted the request;
/// the dispatcher loop itself never terminates because of one.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine stopped")]
    Stopped,
}

/// Market-data subscription errors.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("consumer {consumer} is not subscribed to {key}")]
    NotSubscribed { consumer: ConsumerId, key: FeedKey },

    #[error("no active feed for {0}")]
    UnknownFeed(FeedKey),
}

/// Order ledger errors.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("order {id} is {status}, operation requires a non-terminal order")]
    InvalidState { id: OrderId, status: OrderStatus },

    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),
}

/// Backend/broker errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("rejected by broker: {0}")]
    Rejected(String),

    #[error("no historical data remaining")]
    EndOfData,

    #[error("broker API error: {0}")]
    Api(String),
}

/// Persistence boundary errors.
///
/// Storage itself lives outside this system; these are the failures its
/// collaborator may surface through [`crate::traits::EntityStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
