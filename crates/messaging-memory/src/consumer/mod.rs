use std::sync::{Arc, Weak};

use async_trait::async_trait;
use qq_messaging::{Consumer, Message};
use tokio::sync::{Mutex, mpsc};

pub(crate) type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Message>>>;
pub(crate) type WeakReceiver = Weak<Mutex<mpsc::UnboundedReceiver<Message>>>;

/// A consumer of an in-memory queue.
#[derive(Clone, Debug)]
pub struct MemoryConsumer {
    destination: String,
    receiver: SharedReceiver,
}

impl MemoryConsumer {
    pub(crate) const fn new(destination: String, receiver: SharedReceiver) -> Self {
        Self {
            destination,
            receiver,
        }
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn next(&self) -> Option<Message> {
        self.receiver.lock().await.recv().await
    }

    fn destination(&self) -> &str {
        &self.destination
    }
}
