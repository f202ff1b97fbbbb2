use crate::consumer::Consumer;
use crate::message::Message;

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;

/// Marker trait for transport errors
pub trait TransportError: Error + Send + Sync + 'static {}

/// A connected handle to a message bus offering one-way delivery.
///
/// Destinations are named queues. Publishing never waits for a consumer and
/// consuming never implies a reply; request/reply is layered on top.
#[async_trait]
pub trait Transport
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the transport.
    type Error: TransportError;

    /// The consumer type returned by `consume`.
    type Consumer: Consumer;

    /// Publish a message to the named destination.
    async fn publish(&self, destination: &str, message: Message) -> Result<(), Self::Error>;

    /// Start consuming from the named destination.
    async fn consume(&self, destination: &str) -> Result<Self::Consumer, Self::Error>;
}
