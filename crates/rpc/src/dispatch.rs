use crate::correlation::{CorrelationTable, Delivery};
use crate::protocol::ReplyEnvelope;

use std::sync::Arc;

use qq_messaging::{Consumer, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the dispatch loop did with one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A waiter received its reply.
    Delivered,
    /// A waiter received a decode fault.
    DecodeFault,
    /// No waiter was registered under the token.
    Orphaned,
    /// The message carried no correlation token.
    Malformed,
}

/// Counters kept by a dispatch loop over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Replies handed to their waiter.
    pub delivered: u64,
    /// Replies whose body did not decode into the expected shape.
    pub decode_faults: u64,
    /// Replies with no matching waiter (late or duplicate).
    pub orphaned: u64,
    /// Messages without a usable correlation token.
    pub malformed: u64,
}

impl DispatchStats {
    fn record(&mut self, dispatched: Dispatched) {
        match dispatched {
            Dispatched::Delivered => self.delivered += 1,
            Dispatched::DecodeFault => self.decode_faults += 1,
            Dispatched::Orphaned => self.orphaned += 1,
            Dispatched::Malformed => self.malformed += 1,
        }
    }
}

/// Demultiplexes a client's reply queue onto its pending waiters.
#[derive(Debug)]
pub struct DispatchLoop<C: Consumer> {
    consumer: C,
    table: Arc<CorrelationTable>,
}

impl<C: Consumer> DispatchLoop<C> {
    /// Creates a dispatch loop over a reply consumer.
    pub const fn new(consumer: C, table: Arc<CorrelationTable>) -> Self {
        Self { consumer, table }
    }

    /// Routes a single inbound message to its waiter.
    ///
    /// Never fails: malformed and orphaned messages are logged and dropped.
    pub fn dispatch(&self, message: Message) -> Dispatched {
        let envelope = match ReplyEnvelope::from_message(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping reply without correlation token");
                return Dispatched::Malformed;
            }
        };

        let Some(waiter) = self.table.take_and_remove(envelope.token.as_str()) else {
            warn!(token = %envelope.token, "received reply for unknown correlation token");
            return Dispatched::Orphaned;
        };

        let expected = waiter.expected();
        match waiter.deliver(envelope.body) {
            Delivery::Delivered => {
                debug!(token = %envelope.token, %expected, "delivered reply");
                Dispatched::Delivered
            }
            Delivery::Faulted => {
                warn!(token = %envelope.token, %expected, "reply did not decode into the expected shape");
                Dispatched::DecodeFault
            }
            Delivery::Unclaimed => {
                debug!(token = %envelope.token, "caller dropped before reply arrived");
                Dispatched::Orphaned
            }
        }
    }

    /// Runs until the reply stream ends or the token is cancelled.
    pub async fn run(self, shutdown_token: CancellationToken) -> DispatchStats {
        let mut stats = DispatchStats::default();

        loop {
            tokio::select! {
                biased;
                () = shutdown_token.cancelled() => {
                    debug!(destination = self.consumer.destination(), "dispatch loop cancelled");
                    break;
                }
                message = self.consumer.next() => {
                    let Some(message) = message else {
                        debug!(destination = self.consumer.destination(), "reply stream closed");
                        break;
                    };

                    stats.record(self.dispatch(message));
                }
            }
        }

        stats
    }
}
