use crate::error::{Error, Result};
use crate::protocol::{ReplyEnvelope, RequestEnvelope};

use qq_messaging::{Message, Transport};
use tracing::debug;

/// Publishes request and reply envelopes to bus destinations.
///
/// Faults are returned to the caller as [`Error::Publish`]; nothing is
/// retried.
#[derive(Clone, Debug)]
pub struct Publisher<T: Transport> {
    transport: T,
}

impl<T: Transport> Publisher<T> {
    /// Creates a publisher over a transport.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Publishes a request envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the publish.
    pub async fn publish_request(&self, destination: &str, envelope: RequestEnvelope) -> Result<()> {
        debug!(destination, token = %envelope.token, "publishing request");

        self.publish(destination, envelope.into_message()).await
    }

    /// Publishes a reply envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the publish.
    pub async fn publish_reply(&self, destination: &str, envelope: ReplyEnvelope) -> Result<()> {
        debug!(destination, token = %envelope.token, "publishing reply");

        self.publish(destination, envelope.into_message()).await
    }

    async fn publish(&self, destination: &str, message: Message) -> Result<()> {
        self.transport
            .publish(destination, message)
            .await
            .map_err(|e| Error::Publish {
                destination: destination.to_string(),
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationToken;
    use crate::protocol::CallerIdentity;

    use bytes::Bytes;
    use qq_messaging::Consumer;
    use qq_messaging_memory::MemoryTransport;

    #[tokio::test]
    async fn test_publish_request_attaches_headers() {
        let transport = MemoryTransport::new();
        let consumer = transport.consume("rpc_queue").await.unwrap();
        let publisher = Publisher::new(transport);

        publisher
            .publish_request(
                "rpc_queue",
                RequestEnvelope {
                    token: CorrelationToken::from("abc"),
                    reply_to: "replies".to_string(),
                    caller: CallerIdentity::from("bob"),
                    body: Bytes::from_static(b"{}"),
                },
            )
            .await
            .unwrap();

        let message = consumer.next().await.unwrap();
        assert_eq!(message.correlation_id(), Some("abc"));
        assert_eq!(message.reply_to(), Some("replies"));
        assert_eq!(message.user_id(), Some("bob"));
    }

    #[tokio::test]
    async fn test_publish_fault() {
        let transport = MemoryTransport::new();
        transport.close_queue("replies");
        let publisher = Publisher::new(transport);

        let result = publisher
            .publish_reply(
                "replies",
                ReplyEnvelope {
                    token: CorrelationToken::from("abc"),
                    body: Bytes::from_static(b"{}"),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(Error::Publish { destination, .. }) if destination == "replies"
        ));
    }
}
