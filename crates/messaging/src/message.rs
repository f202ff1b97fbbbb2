//! Core message format shared by every transport.
//!
//! A message is an opaque payload plus string headers. Routing metadata for
//! request/reply (correlation token, reply-to destination, caller identity)
//! rides in well-known headers so a transport never has to inspect payloads.

use bytes::Bytes;

/// Message carried by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Message payload
    pub payload: Bytes,
    /// Message headers as key-value pairs
    pub headers: Vec<(String, String)>,
}

impl Message {
    /// Create a new message with just a payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    /// Create a new message with payload and headers
    pub fn with_headers(payload: impl Into<Bytes>, headers: Vec<(String, String)>) -> Self {
        Self {
            payload: payload.into(),
            headers,
        }
    }

    /// Add a header to the message, replacing any previous value for the key.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|(k, _)| *k != key);
        self.headers.push((key, value.into()));
        self
    }

    /// Get a header value by key
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set the correlation id header.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        self.with_header(headers::CORRELATION_ID, correlation_id)
    }

    /// Get the correlation id header.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.get_header(headers::CORRELATION_ID)
    }

    /// Set the reply-to header.
    #[must_use]
    pub fn with_reply_to(self, reply_to: impl Into<String>) -> Self {
        self.with_header(headers::REPLY_TO, reply_to)
    }

    /// Get the reply-to header.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.get_header(headers::REPLY_TO)
    }

    /// Set the user id header.
    #[must_use]
    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with_header(headers::USER_ID, user_id)
    }

    /// Get the user id header.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.get_header(headers::USER_ID)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Bytes> for Message {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static str> for Message {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

/// Header registry.
pub mod headers {
    /// Correlation id header name
    pub const CORRELATION_ID: &str = "correlation_id";

    /// Reply-to header name
    pub const REPLY_TO: &str = "reply_to";

    /// User id header name
    pub const USER_ID: &str = "user_id";

    /// Content type header name
    pub const CONTENT_TYPE: &str = "content_type";
}
