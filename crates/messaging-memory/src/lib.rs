//! In-memory implementation of the messaging crate.
//!
//! Every destination is a buffered work queue: messages published before
//! anyone consumes are kept, and clones of a consumer compete for messages.
//! Once every consumer of a destination is dropped, publishes to it are
//! rejected until it is consumed again.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod consumer;
mod transport;

pub use consumer::MemoryConsumer;
pub use transport::{Error, MemoryTransport};
