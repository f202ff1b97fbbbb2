mod error;

use crate::consumer::NatsConsumer;
pub use error::Error;

use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use qq_messaging::{Message, Transport};
use tracing::{debug, info};

/// Options for connecting a NATS transport.
#[derive(Clone, Debug)]
pub struct NatsTransportOptions {
    /// Server URL, e.g. `nats://localhost:4222`.
    pub url: String,

    /// Connection name reported to the server.
    pub name: String,
}

impl Default for NatsTransportOptions {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            name: "qq".to_string(),
        }
    }
}

/// A transport backed by NATS core subjects.
#[derive(Clone, Debug)]
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Wraps an existing NATS client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(options: NatsTransportOptions) -> Result<Self, Error> {
        let client = ConnectOptions::new()
            .name(options.name.clone())
            .connect(options.url.as_str())
            .await
            .map_err(|e| Error::Connect(options.url.clone(), e))?;

        info!(url = %options.url, "connected to NATS");

        Ok(Self::new(client))
    }
}

pub(crate) fn to_nats_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        map.insert(key.as_str(), value.as_str());
    }
    map
}

pub(crate) fn from_nats_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(key, values)| {
            values
                .first()
                .map(|value| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl Transport for NatsTransport {
    type Error = Error;
    type Consumer = NatsConsumer;

    async fn publish(&self, destination: &str, message: Message) -> Result<(), Self::Error> {
        let headers = to_nats_headers(&message.headers);

        self.client
            .publish_with_headers(destination.to_string(), headers, message.payload)
            .await
            .map_err(|e| Error::Publish(destination.to_string(), e))?;

        debug!(destination, "published message");

        Ok(())
    }

    async fn consume(&self, destination: &str) -> Result<Self::Consumer, Self::Error> {
        let subscriber = self
            .client
            .queue_subscribe(destination.to_string(), destination.to_string())
            .await
            .map_err(|e| Error::Subscribe(destination.to_string(), e))?;

        debug!(destination, "joined queue group");

        Ok(NatsConsumer::new(destination.to_string(), subscriber))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use qq_messaging::{Consumer, headers};
    use tokio::time::timeout;

    #[test]
    fn test_header_conversion() {
        let message = Message::new("body")
            .with_correlation_id("token")
            .with_reply_to("replies")
            .with_user_id("alice");

        let nats_headers = to_nats_headers(&message.headers);
        let mut converted = from_nats_headers(&nats_headers);
        converted.sort();

        let mut expected = message.headers;
        expected.sort();

        assert_eq!(converted, expected);
    }

    #[test]
    fn test_empty_headers() {
        let nats_headers = to_nats_headers(&[]);
        assert!(from_nats_headers(&nats_headers).is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a NATS server on localhost:4222"]
    async fn test_publish_and_consume() {
        let transport = NatsTransport::connect(NatsTransportOptions::default())
            .await
            .expect("Failed to connect to NATS");

        let consumer = transport.consume("qq_test_publish_and_consume").await.unwrap();

        transport
            .publish(
                "qq_test_publish_and_consume",
                Message::new("hello").with_correlation_id("abc"),
            )
            .await
            .unwrap();

        let message = timeout(Duration::from_secs(5), consumer.next())
            .await
            .expect("Timed out waiting for message")
            .expect("Subscription closed");

        assert_eq!(message.payload, bytes::Bytes::from("hello"));
        assert_eq!(message.get_header(headers::CORRELATION_ID), Some("abc"));
    }
}
