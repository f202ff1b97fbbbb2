//! Key/value service exposing a `Store` over the RPC engine.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use async_trait::async_trait;
use qq_rpc::protocol::{
    AddReply, AddRequest, Entity, GetAllReply, GetAllRequest, GetReply, GetRequest, RemoveReply,
    RemoveRequest,
};
use qq_rpc::{CallerIdentity, Handler, HandlerError, Router};
use qq_store::Store;
use tracing::debug;

/// Handles the four key/value request types against a store.
#[derive(Clone, Debug)]
pub struct StoreService<S: Store> {
    store: S,
}

impl<S: Store> StoreService<S> {
    /// Creates a service over a store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// A router with every request type routed to this service.
    #[must_use]
    pub fn router(self) -> Router {
        Router::new()
            .route::<AddRequest, _>(self.clone())
            .route::<RemoveRequest, _>(self.clone())
            .route::<GetRequest, _>(self.clone())
            .route::<GetAllRequest, _>(self)
    }
}

#[async_trait]
impl<S: Store> Handler<AddRequest> for StoreService<S> {
    async fn handle(
        &self,
        request: AddRequest,
        caller: &CallerIdentity,
    ) -> Result<AddReply, HandlerError> {
        debug!(%caller, key = %request.key, "add");

        let added = self
            .store
            .put(&request.key, &request.value)
            .map_err(HandlerError::service)?;

        Ok(AddReply { added })
    }
}

#[async_trait]
impl<S: Store> Handler<RemoveRequest> for StoreService<S> {
    async fn handle(
        &self,
        request: RemoveRequest,
        caller: &CallerIdentity,
    ) -> Result<RemoveReply, HandlerError> {
        debug!(%caller, key = %request.key, "remove");

        let removed = self
            .store
            .delete(&request.key)
            .map_err(HandlerError::service)?;

        Ok(RemoveReply { removed })
    }
}

#[async_trait]
impl<S: Store> Handler<GetRequest> for StoreService<S> {
    async fn handle(
        &self,
        request: GetRequest,
        caller: &CallerIdentity,
    ) -> Result<GetReply, HandlerError> {
        debug!(%caller, key = %request.key, "get");

        let value = self
            .store
            .get(&request.key)
            .map_err(HandlerError::service)?;

        Ok(GetReply { value })
    }
}

#[async_trait]
impl<S: Store> Handler<GetAllRequest> for StoreService<S> {
    async fn handle(
        &self,
        _request: GetAllRequest,
        caller: &CallerIdentity,
    ) -> Result<GetAllReply, HandlerError> {
        debug!(%caller, "get all");

        let entities = self
            .store
            .list()
            .map_err(HandlerError::service)?
            .into_iter()
            .map(Entity::from)
            .collect();

        Ok(GetAllReply { entities })
    }
}
