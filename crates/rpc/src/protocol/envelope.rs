//! Envelopes carried as bus messages.
//!
//! The body of a message is the encoded request or reply. Routing metadata
//! travels in headers: the correlation token, the reply-to destination and
//! the caller identity.

use crate::correlation::CorrelationToken;
use crate::error::CodecError;

use std::fmt::{self, Display};

use bytes::Bytes;
use qq_messaging::{Message, headers};

const CONTENT_TYPE_JSON: &str = "application/json";

/// Opaque attribution of a request to a caller.
///
/// A request without an identity header belongs to the anonymous caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Creates a caller identity.
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// The anonymous identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(String::new())
    }

    /// Whether this is the anonymous identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("anonymous")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for CallerIdentity {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

impl From<String> for CallerIdentity {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

fn required<'a>(message: &'a Message, header: &'static str) -> Result<&'a str, CodecError> {
    message
        .get_header(header)
        .filter(|value| !value.is_empty())
        .ok_or(CodecError::MissingHeader(header))
}

/// A request as it travels to a server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Token the reply must carry.
    pub token: CorrelationToken,
    /// Destination the reply must be published to.
    pub reply_to: String,
    /// Who sent the request.
    pub caller: CallerIdentity,
    /// Encoded request, including its discriminator.
    pub body: Bytes,
}

impl RequestEnvelope {
    /// Reads an envelope from a bus message.
    ///
    /// # Errors
    ///
    /// Returns an error if the correlation token or reply-to header is
    /// missing.
    pub fn from_message(message: Message) -> Result<Self, CodecError> {
        let token = CorrelationToken::from(required(&message, headers::CORRELATION_ID)?);
        let reply_to = required(&message, headers::REPLY_TO)?.to_string();
        let caller = message
            .user_id()
            .map(CallerIdentity::from)
            .unwrap_or_default();

        Ok(Self {
            token,
            reply_to,
            caller,
            body: message.payload,
        })
    }

    /// Converts the envelope into a bus message.
    #[must_use]
    pub fn into_message(self) -> Message {
        let message = Message::new(self.body)
            .with_header(headers::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .with_correlation_id(self.token.as_str())
            .with_reply_to(self.reply_to);

        if self.caller.is_anonymous() {
            message
        } else {
            message.with_user_id(self.caller.as_str())
        }
    }
}

/// A reply as it travels back to a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyEnvelope {
    /// Token copied from the request.
    pub token: CorrelationToken,
    /// Encoded reply, including its discriminator.
    pub body: Bytes,
}

impl ReplyEnvelope {
    /// Reads an envelope from a bus message.
    ///
    /// # Errors
    ///
    /// Returns an error if the correlation token header is missing.
    pub fn from_message(message: Message) -> Result<Self, CodecError> {
        let token = CorrelationToken::from(required(&message, headers::CORRELATION_ID)?);

        Ok(Self {
            token,
            body: message.payload,
        })
    }

    /// Converts the envelope into a bus message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::new(self.body)
            .with_header(headers::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .with_correlation_id(self.token.as_str())
    }
}
