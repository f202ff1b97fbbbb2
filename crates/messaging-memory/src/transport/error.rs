use qq_messaging::TransportError;
use thiserror::Error;

/// Errors that can occur in the in-memory transport.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The whole transport has been closed.
    #[error("transport is closed")]
    Closed,

    /// The destination has been closed.
    #[error("queue `{0}` is closed")]
    QueueClosed(String),
}

impl TransportError for Error {}
