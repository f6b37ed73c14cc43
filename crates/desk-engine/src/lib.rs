//! The request dispatcher.
//!
//! One engine thread serializes every broker-facing operation over a FIFO
//! queue, so the single-connection backend is never used by two logical
//! operations at once. Callers on any thread submit typed requests through
//! [`EngineHandle`] and block until their result comes back.

mod dispatcher;
mod handle;
mod request;
mod service_set;

pub use dispatcher::Engine;
pub use handle::EngineHandle;
pub use service_set::{ModeSets, ServiceSet};
