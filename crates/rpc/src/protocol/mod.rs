//! Protocol layer for the RPC engine.
//!
//! This module contains the core protocol definitions including:
//! - The request and reply shapes and their discriminators
//! - The JSON body codec
//! - Request and reply envelopes carried as bus messages

pub mod codec;
pub mod envelope;
pub mod message;

pub use codec::{decode_reply, decode_request, encode_reply, encode_request, peek_discriminator};
pub use envelope::{CallerIdentity, ReplyEnvelope, RequestEnvelope};
pub use message::{
    AddReply, AddRequest, Entity, GetAllReply, GetAllRequest, GetReply, GetRequest, RemoveReply,
    RemoveRequest, ReplyKind, RequestKind, RpcReply, RpcRequest,
};
