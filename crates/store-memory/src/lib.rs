//! In-memory (single node) implementation of key/value storage for local
//! development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qq_store::Store;

/// In-memory key/value store.
///
/// Cloning yields another handle on the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Creates a new `MemoryStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Error = Error;

    fn put(&self, key: &str, value: &str) -> Result<bool, Self::Error> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(self.map.write().remove(key).is_some())
    }

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.map.read().get(key).cloned())
    }

    fn list(&self) -> Result<Vec<(String, String)>, Self::Error> {
        Ok(self
            .map
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
