//! Error types for the RPC engine.

use crate::correlation::CorrelationToken;

use std::time::Duration;

use thiserror::Error;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A body or envelope could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The transport rejected a publish.
    #[error("Failed to publish to `{destination}`: {source}")]
    Publish {
        /// Destination the envelope was addressed to.
        destination: String,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The transport refused to open a consumer.
    #[error("Failed to consume from `{destination}`: {source}")]
    Consume {
        /// Destination that could not be consumed.
        destination: String,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// A waiter is already registered under this token.
    #[error("Duplicate correlation token: {0}")]
    DuplicateToken(CorrelationToken),

    /// No route exists for a request discriminator.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// A handler failed to produce a reply.
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// No reply arrived before the deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The reply slot was dropped without a delivery.
    #[error("Reply slot dropped without delivery")]
    Abandoned,

    /// The client or server is shutting down.
    #[error("Shutting down")]
    ShuttingDown,

    /// The server's workers were already started.
    #[error("Server already started")]
    AlreadyStarted,

    /// A configuration value cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Codec-related errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("Failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Deserialization failed.
    #[error("Failed to deserialize: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The body names a different message type than the one expected.
    #[error("Unexpected message type: expected `{expected}`, got `{actual}`")]
    KindMismatch {
        /// Expected discriminator.
        expected: &'static str,
        /// Discriminator found in the body.
        actual: String,
    },

    /// A required envelope header is absent or empty.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),
}

/// Handler errors from server-side processing.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler returned an error.
    #[error("Handler error: {0}")]
    Internal(String),

    /// A backing service failed.
    #[error(transparent)]
    Service(BoxError),
}

impl HandlerError {
    /// Wraps a backing service error.
    pub fn service(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Service(Box::new(error))
    }
}
