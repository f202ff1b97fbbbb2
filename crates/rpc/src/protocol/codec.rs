//! JSON body codec.
//!
//! Every body is a JSON object whose `name` field holds the type
//! discriminator; the remaining fields are the shape's own.

use super::message::{RpcReply, RpcRequest};
use crate::error::CodecError;

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Serialize)]
struct Tagged<'a, T> {
    name: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct Discriminator {
    name: String,
}

fn encode<T: Serialize>(name: &'static str, body: &T) -> Result<Bytes, CodecError> {
    serde_json::to_vec(&Tagged { name, body })
        .map(Bytes::from)
        .map_err(CodecError::Serialize)
}

fn decode<T: DeserializeOwned>(expected: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    let actual = peek_discriminator(bytes)?;
    if actual != expected {
        return Err(CodecError::KindMismatch { expected, actual });
    }

    serde_json::from_slice(bytes).map_err(CodecError::Deserialize)
}

/// Encodes a request body.
///
/// # Errors
///
/// Returns an error if the request cannot be serialized.
pub fn encode_request<R: RpcRequest>(request: &R) -> Result<Bytes, CodecError> {
    encode(R::KIND.as_str(), request)
}

/// Encodes a reply body.
///
/// # Errors
///
/// Returns an error if the reply cannot be serialized.
pub fn encode_reply<R: RpcReply>(reply: &R) -> Result<Bytes, CodecError> {
    encode(R::KIND.as_str(), reply)
}

/// Reads only the discriminator of a body.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object with a string `name`.
pub fn peek_discriminator(bytes: &[u8]) -> Result<String, CodecError> {
    serde_json::from_slice::<Discriminator>(bytes)
        .map(|discriminator| discriminator.name)
        .map_err(CodecError::Deserialize)
}

/// Decodes a request body into a known shape.
///
/// # Errors
///
/// Returns an error if the body is malformed or names another request type.
pub fn decode_request<R: RpcRequest>(bytes: &[u8]) -> Result<R, CodecError> {
    decode(R::KIND.as_str(), bytes)
}

/// Decodes a reply body into a known shape.
///
/// # Errors
///
/// Returns an error if the body is malformed or names another reply type.
pub fn decode_reply<R: RpcReply>(bytes: &[u8]) -> Result<R, CodecError> {
    decode(R::KIND.as_str(), bytes)
}
