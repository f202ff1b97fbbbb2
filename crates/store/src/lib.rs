//! Abstract interface for the key/value storage behind the service.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

/// Marker trait for store errors
pub trait StoreError: Debug + Error + Send + Sync + 'static {}

/// A trait representing a string key/value store.
///
/// Operations are synchronous and short; implementations must not block on
/// I/O for long since they are called from async request handlers.
pub trait Store: Clone + Debug + Send + Sync + 'static {
    /// The error type for the store.
    type Error: StoreError;

    /// Stores a value under a key, overwriting any previous value. Returns
    /// whether the value was stored.
    fn put(&self, key: &str, value: &str) -> Result<bool, Self::Error>;

    /// Deletes a key. Returns whether a value was removed.
    fn delete(&self, key: &str) -> Result<bool, Self::Error>;

    /// Retrieves the value stored under a key.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Lists every key/value pair, ordered by key.
    fn list(&self) -> Result<Vec<(String, String)>, Self::Error>;
}
