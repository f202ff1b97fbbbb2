use crate::message::Message;

use std::fmt::Debug;

use async_trait::async_trait;

/// A trait representing a consumer of a single destination.
///
/// Clones of a consumer compete for the same destination: every message is
/// handed to exactly one of them.
#[async_trait]
pub trait Consumer
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// Waits for the next message. Returns `None` once the destination is
    /// closed and drained.
    async fn next(&self) -> Option<Message>;

    /// The destination this consumer reads from.
    fn destination(&self) -> &str;
}
