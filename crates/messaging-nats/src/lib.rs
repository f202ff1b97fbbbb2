//! NATS implementation of the messaging crate.
//!
//! Destinations map to NATS subjects. Consumers join a queue group named
//! after the destination, so competing consumers (in this or any other
//! process) share the messages published to it.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod consumer;
mod transport;

pub use consumer::NatsConsumer;
pub use transport::{Error, NatsTransport, NatsTransportOptions};
