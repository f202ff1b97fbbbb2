use crate::transport::from_nats_headers;

use std::sync::Arc;

use async_nats::Subscriber;
use async_trait::async_trait;
use futures::StreamExt;
use qq_messaging::{Consumer, Message};
use tokio::sync::Mutex;

/// A queue-group subscription to a NATS subject.
#[derive(Clone, Debug)]
pub struct NatsConsumer {
    destination: String,
    subscriber: Arc<Mutex<Subscriber>>,
}

impl NatsConsumer {
    pub(crate) fn new(destination: String, subscriber: Subscriber) -> Self {
        Self {
            destination,
            subscriber: Arc::new(Mutex::new(subscriber)),
        }
    }
}

#[async_trait]
impl Consumer for NatsConsumer {
    async fn next(&self) -> Option<Message> {
        let message = self.subscriber.lock().await.next().await?;
        let headers = message
            .headers
            .as_ref()
            .map(from_nats_headers)
            .unwrap_or_default();

        Some(Message::with_headers(message.payload, headers))
    }

    fn destination(&self) -> &str {
        &self.destination
    }
}
