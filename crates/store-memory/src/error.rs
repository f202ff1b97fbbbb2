use qq_store::StoreError;
use thiserror::Error;

/// Errors that can occur in this crate.
///
/// The in-memory store never fails; the type exists to satisfy `Store`.
#[derive(Clone, Debug, Error)]
#[error("memory store error")]
pub struct Error;

impl StoreError for Error {}
