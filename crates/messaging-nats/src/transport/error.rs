use qq_messaging::TransportError;
use thiserror::Error;

/// Error type for NATS operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connect error.
    #[error("failed to connect to NATS at `{0}`")]
    Connect(String, #[source] async_nats::ConnectError),

    /// Publish error.
    #[error("failed to publish to `{0}`")]
    Publish(String, #[source] async_nats::PublishError),

    /// Subscribe error.
    #[error("failed to subscribe to `{0}`")]
    Subscribe(String, #[source] async_nats::SubscribeError),
}

impl TransportError for Error {}
