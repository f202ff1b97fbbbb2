use crate::error::{Error, Result};
use crate::protocol::{RpcReply, ReplyKind, decode_reply};

use std::borrow::Borrow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{self, Debug, Display};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Opaque token joining a request to its reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Generates a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The token as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CorrelationToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for CorrelationToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// What happened to a delivery handed to a waiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The caller received a decoded reply.
    Delivered,
    /// The caller received a fault instead of a reply.
    Faulted,
    /// The caller had already gone away.
    Unclaimed,
}

type DeliverFn = Box<dyn FnOnce(Result<Bytes>) -> Delivery + Send>;

/// One in-flight request awaiting its reply.
///
/// The waiter is consumed by delivery, so it can be resolved at most once.
pub struct PendingWaiter {
    expected: ReplyKind,
    deliver: DeliverFn,
}

impl PendingWaiter {
    /// Creates a waiter expecting replies of type `R`, along with the
    /// receiving end of its delivery slot.
    #[must_use]
    pub fn new<R: RpcReply>() -> (Self, oneshot::Receiver<Result<R>>) {
        let (sender, receiver) = oneshot::channel();

        let deliver: DeliverFn = Box::new(move |outcome: Result<Bytes>| {
            let outcome =
                outcome.and_then(|payload| decode_reply::<R>(&payload).map_err(Error::from));
            let faulted = outcome.is_err();

            match sender.send(outcome) {
                Err(_) => Delivery::Unclaimed,
                Ok(()) if faulted => Delivery::Faulted,
                Ok(()) => Delivery::Delivered,
            }
        });

        (
            Self {
                expected: R::KIND,
                deliver,
            },
            receiver,
        )
    }

    /// The reply type this waiter decodes.
    #[must_use]
    pub const fn expected(&self) -> ReplyKind {
        self.expected
    }

    /// Decodes a reply body and hands the result to the caller.
    pub fn deliver(self, payload: Bytes) -> Delivery {
        (self.deliver)(Ok(payload))
    }

    /// Hands a fault to the caller.
    pub fn fail(self, error: Error) -> Delivery {
        (self.deliver)(Err(error))
    }
}

impl Debug for PendingWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWaiter")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// All pending waiters of one client, keyed by correlation token.
///
/// A single lock covers each operation. It is never held across an await
/// point or while a waiter is being delivered.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    waiters: Mutex<HashMap<CorrelationToken, PendingWaiter>>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter under a token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateToken`] if the token is already registered.
    /// The existing waiter is left untouched.
    pub fn register(&self, token: CorrelationToken, waiter: PendingWaiter) -> Result<()> {
        match self.waiters.lock().entry(token) {
            Entry::Occupied(entry) => Err(Error::DuplicateToken(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(waiter);
                Ok(())
            }
        }
    }

    /// Atomically removes and returns the waiter for a token.
    ///
    /// Only the first caller for a given registration gets the waiter; every
    /// later call returns `None`.
    pub fn take_and_remove(&self, token: &str) -> Option<PendingWaiter> {
        self.waiters.lock().remove(token)
    }

    /// Number of pending waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Whether no waiters are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::protocol::{AddReply, GetReply, encode_reply};

    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_generated_tokens_are_unique() {
        let tokens: HashSet<_> = (0..1000).map(|_| CorrelationToken::generate()).collect();

        assert_eq!(tokens.len(), 1000);
        assert!(tokens.iter().all(|token| token.as_str().len() == 32));
    }

    #[test]
    fn test_register_and_take() {
        let table = CorrelationTable::new();
        let (waiter, _receiver) = PendingWaiter::new::<AddReply>();

        table.register(CorrelationToken::from("a"), waiter).unwrap();
        assert_eq!(table.len(), 1);

        let waiter = table.take_and_remove("a").unwrap();
        assert_eq!(waiter.expected(), ReplyKind::Add);
        assert!(table.is_empty());
        assert!(table.take_and_remove("a").is_none());
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let table = CorrelationTable::new();
        let (first, mut first_receiver) = PendingWaiter::new::<AddReply>();
        let (second, _second_receiver) = PendingWaiter::new::<GetReply>();

        table.register(CorrelationToken::from("a"), first).unwrap();
        assert!(matches!(
            table.register(CorrelationToken::from("a"), second),
            Err(Error::DuplicateToken(token)) if token.as_str() == "a"
        ));

        // The original registration survives.
        let waiter = table.take_and_remove("a").unwrap();
        assert_eq!(waiter.expected(), ReplyKind::Add);
        assert_eq!(
            waiter.deliver(encode_reply(&AddReply { added: true }).unwrap()),
            Delivery::Delivered
        );
        assert!(first_receiver.try_recv().unwrap().unwrap().added);
    }

    #[test]
    fn test_waiter_decodes_expected_shape() {
        let (waiter, mut receiver) = PendingWaiter::new::<GetReply>();
        let body = encode_reply(&AddReply { added: true }).unwrap();

        assert_eq!(waiter.deliver(body), Delivery::Faulted);
        assert!(matches!(
            receiver.try_recv().unwrap(),
            Err(Error::Codec(CodecError::KindMismatch { .. }))
        ));
    }

    #[test]
    fn test_fail_and_unclaimed() {
        let (waiter, mut receiver) = PendingWaiter::new::<GetReply>();
        assert_eq!(waiter.fail(Error::ShuttingDown), Delivery::Faulted);
        assert!(matches!(receiver.try_recv().unwrap(), Err(Error::ShuttingDown)));

        let (waiter, receiver) = PendingWaiter::new::<GetReply>();
        drop(receiver);
        assert_eq!(
            waiter.deliver(encode_reply(&GetReply::default()).unwrap()),
            Delivery::Unclaimed
        );
    }

    #[test]
    fn test_concurrent_take_is_at_most_once() {
        for round in 0..50 {
            let table = Arc::new(CorrelationTable::new());
            let token = format!("token-{round}");
            let (waiter, _receiver) = PendingWaiter::new::<AddReply>();
            table.register(CorrelationToken::from(token.as_str()), waiter).unwrap();

            let winners: usize = (0..8)
                .map(|_| {
                    let table = Arc::clone(&table);
                    let token = token.clone();
                    std::thread::spawn(move || usize::from(table.take_and_remove(&token).is_some()))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .sum();

            assert_eq!(winners, 1);
            assert!(table.is_empty());
        }
    }
}
