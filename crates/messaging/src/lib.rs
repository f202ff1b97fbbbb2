//! Abstract interface for one-way messaging over named destinations.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Consumers pull messages from a destination.
pub mod consumer;

/// Messages and the header registry.
pub mod message;

/// Transports publish to and consume from named destinations.
pub mod transport;

pub use consumer::Consumer;
pub use message::{Message, headers};
pub use transport::{Transport, TransportError};
