//! Request and reply shapes.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Base trait for requests.
///
/// Each request shape is statically paired with the reply shape a server
/// answers it with, so callers never inspect a reply's type at runtime.
pub trait RpcRequest: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// The reply type for this request.
    type Reply: RpcReply;

    /// The discriminator carried in the body.
    const KIND: RequestKind;
}

/// Base trait for replies.
pub trait RpcReply: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// The discriminator carried in the body.
    const KIND: ReplyKind;
}

/// The request types understood by the key/value service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Store a value.
    Add,
    /// Delete a key.
    Remove,
    /// Look up a single key.
    Get,
    /// List every entry.
    GetAll,
}

impl RequestKind {
    /// All request kinds.
    pub const ALL: [Self; 4] = [Self::Add, Self::Remove, Self::Get, Self::GetAll];

    /// The wire discriminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Get => "get",
            Self::GetAll => "get all",
        }
    }

    /// Looks up a kind by its wire discriminator.
    #[must_use]
    pub fn from_discriminator(discriminator: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == discriminator)
    }

    /// The reply kind a server answers this request with.
    #[must_use]
    pub const fn reply(self) -> ReplyKind {
        match self {
            Self::Add => ReplyKind::Add,
            Self::Remove => ReplyKind::Remove,
            Self::Get => ReplyKind::Get,
            Self::GetAll => ReplyKind::GetAll,
        }
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reply types produced by the key/value service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// Reply to an add.
    Add,
    /// Reply to a remove.
    Remove,
    /// Reply to a get.
    Get,
    /// Reply to a get all.
    GetAll,
}

impl ReplyKind {
    /// The wire discriminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add reply",
            Self::Remove => "remove reply",
            Self::Get => "get reply",
            Self::GetAll => "get all reply",
        }
    }
}

impl Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The key.
    pub key: String,
    /// The value.
    pub value: String,
}

impl Entity {
    /// Creates a new entity.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<(String, String)> for Entity {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

/// Store a value under a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    /// The key.
    pub key: String,
    /// The value.
    pub value: String,
}

impl AddRequest {
    /// Creates a new add request.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Delete a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    /// The key.
    pub key: String,
}

impl RemoveRequest {
    /// Creates a new remove request.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Look up a single key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    /// The key.
    pub key: String,
}

impl GetRequest {
    /// Creates a new get request.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// List every entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAllRequest {}

/// Reply to [`AddRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReply {
    /// Whether the value was stored.
    pub added: bool,
}

/// Reply to [`RemoveRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveReply {
    /// Whether a value was removed.
    pub removed: bool,
}

/// Reply to [`GetRequest`]. A missing key is `value: None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReply {
    /// The stored value, if any.
    #[serde(default)]
    pub value: Option<String>,
}

/// Reply to [`GetAllRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAllReply {
    /// Every stored entry.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl RpcRequest for AddRequest {
    type Reply = AddReply;
    const KIND: RequestKind = RequestKind::Add;
}

impl RpcRequest for RemoveRequest {
    type Reply = RemoveReply;
    const KIND: RequestKind = RequestKind::Remove;
}

impl RpcRequest for GetRequest {
    type Reply = GetReply;
    const KIND: RequestKind = RequestKind::Get;
}

impl RpcRequest for GetAllRequest {
    type Reply = GetAllReply;
    const KIND: RequestKind = RequestKind::GetAll;
}

impl RpcReply for AddReply {
    const KIND: ReplyKind = ReplyKind::Add;
}

impl RpcReply for RemoveReply {
    const KIND: ReplyKind = ReplyKind::Remove;
}

impl RpcReply for GetReply {
    const KIND: ReplyKind = ReplyKind::Get;
}

impl RpcReply for GetAllReply {
    const KIND: ReplyKind = ReplyKind::GetAll;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators() {
        assert_eq!(RequestKind::GetAll.as_str(), "get all");
        assert_eq!(ReplyKind::GetAll.as_str(), "get all reply");

        for kind in RequestKind::ALL {
            assert_eq!(RequestKind::from_discriminator(kind.as_str()), Some(kind));
            assert_eq!(
                kind.reply().as_str(),
                format!("{} reply", kind.as_str())
            );
        }

        assert_eq!(RequestKind::from_discriminator("get all reply"), None);
    }

    #[test]
    fn test_static_pairing() {
        assert_eq!(<AddRequest as RpcRequest>::KIND.reply(), AddReply::KIND);
        assert_eq!(<RemoveRequest as RpcRequest>::KIND.reply(), RemoveReply::KIND);
        assert_eq!(<GetRequest as RpcRequest>::KIND.reply(), GetReply::KIND);
        assert_eq!(<GetAllRequest as RpcRequest>::KIND.reply(), GetAllReply::KIND);
    }
}
