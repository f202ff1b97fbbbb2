//! Correlation-matched request/reply over a one-way message bus.
//!
//! A client publishes each request to a shared work queue, tagged with a
//! fresh correlation token and the name of its private reply queue. A single
//! dispatch task per client reads that reply queue and hands every reply to
//! the waiter registered under its token. Servers run a pool of workers
//! competing on the work queue and route each request by its type
//! discriminator.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Client-side request engine.
pub mod client;

/// Correlation table and pending waiters.
pub mod correlation;

/// Client-side reply demultiplexing.
pub mod dispatch;

mod error;

/// Wire codec, message kinds and envelopes.
pub mod protocol;

/// Envelope publishing.
pub mod publisher;

/// Server-side request routing and worker pool.
pub mod server;

pub use client::{ClientConfig, PendingReply, RequestOptions, RpcClient};
pub use correlation::{CorrelationTable, CorrelationToken, Delivery, PendingWaiter};
pub use dispatch::{DispatchLoop, DispatchStats, Dispatched};
pub use error::{CodecError, Error, HandlerError, Result};
pub use protocol::{CallerIdentity, RpcReply, RpcRequest};
pub use server::{Handler, Router, RpcServer, ServerConfig};
