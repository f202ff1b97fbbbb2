mod error;

use crate::consumer::{MemoryConsumer, SharedReceiver, WeakReceiver};
pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use qq_messaging::{Message, Transport};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug)]
struct Queue {
    sender: mpsc::UnboundedSender<Message>,
    /// Keeps the buffer alive until the first consumer claims it.
    buffered: Option<SharedReceiver>,
    consumers: WeakReceiver,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            sender,
            buffered: Some(Arc::new(tokio::sync::Mutex::new(receiver))),
            consumers: Weak::new(),
        }
    }

    /// Hands out the shared receiver. Once claimed, only consumers keep it
    /// alive.
    fn claim(&mut self) -> SharedReceiver {
        if let Some(receiver) = self.buffered.take() {
            self.consumers = Arc::downgrade(&receiver);
            return receiver;
        }

        if let Some(receiver) = self.consumers.upgrade() {
            return receiver;
        }

        // Every earlier consumer is gone: start over with an empty channel.
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        self.sender = sender;
        self.consumers = Arc::downgrade(&receiver);
        receiver
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    closed: bool,
    closed_queues: HashSet<String>,
    abandoned_queues: HashSet<String>,
    queues: HashMap<String, Queue>,
}

impl BrokerState {
    fn check_open(&self, destination: &str) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }

        if self.closed_queues.contains(destination) {
            return Err(Error::QueueClosed(destination.to_string()));
        }

        Ok(())
    }

    fn queue(&mut self, destination: &str) -> &mut Queue {
        self.queues
            .entry(destination.to_string())
            .or_insert_with(|| {
                debug!(destination, "declaring in-memory queue");
                Queue::new()
            })
    }
}

/// An in-process message broker.
///
/// Cloning yields another handle on the same broker.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryTransport {
    /// Creates a new, empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes a single destination.
    ///
    /// Further publishes to it are rejected. Existing consumers drain what is
    /// already buffered and then end.
    pub fn close_queue(&self, destination: &str) {
        let mut state = self.state.lock();
        state.queues.remove(destination);
        state.closed_queues.insert(destination.to_string());
        drop(state);

        debug!(destination, "closed in-memory queue");
    }

    /// Closes every destination and rejects all further publishes.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.queues.clear();
        drop(state);

        debug!("closed in-memory transport");
    }

    fn send(&self, destination: &str, message: Message) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.check_open(destination)?;

        if state.abandoned_queues.contains(destination) {
            return Err(Error::QueueClosed(destination.to_string()));
        }

        if state.queue(destination).sender.send(message).is_err() {
            // The last consumer is gone, so nothing would ever read this.
            state.queues.remove(destination);
            state.abandoned_queues.insert(destination.to_string());
            drop(state);

            debug!(destination, "in-memory queue abandoned by its consumers");
            return Err(Error::QueueClosed(destination.to_string()));
        }

        Ok(())
    }

    fn receiver(&self, destination: &str) -> Result<SharedReceiver, Error> {
        let mut state = self.state.lock();
        state.check_open(destination)?;
        state.abandoned_queues.remove(destination);

        Ok(state.queue(destination).claim())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = Error;
    type Consumer = MemoryConsumer;

    async fn publish(&self, destination: &str, message: Message) -> Result<(), Self::Error> {
        self.send(destination, message)
    }

    async fn consume(&self, destination: &str) -> Result<Self::Consumer, Self::Error> {
        let receiver = self.receiver(destination)?;

        Ok(MemoryConsumer::new(destination.to_string(), receiver))
    }
}
