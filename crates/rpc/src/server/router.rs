use crate::error::{Error, HandlerError};
use crate::protocol::{CallerIdentity, RpcRequest, decode_request, encode_reply};

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

/// Handles one request type.
#[async_trait]
pub trait Handler<R: RpcRequest>: Send + Sync + 'static {
    /// Produces the reply to a request.
    async fn handle(&self, request: R, caller: &CallerIdentity) -> Result<R::Reply, HandlerError>;
}

/// A handler with its request and reply types erased.
#[async_trait]
trait Route: Send + Sync {
    async fn invoke(&self, body: &[u8], caller: &CallerIdentity) -> Result<Bytes, Error>;
}

struct TypedRoute<R, H> {
    handler: H,
    _request: PhantomData<fn() -> R>,
}

#[async_trait]
impl<R, H> Route for TypedRoute<R, H>
where
    R: RpcRequest,
    H: Handler<R>,
{
    async fn invoke(&self, body: &[u8], caller: &CallerIdentity) -> Result<Bytes, Error> {
        let request = decode_request::<R>(body)?;
        let reply = self.handler.handle(request, caller).await?;

        Ok(encode_reply(&reply)?)
    }
}

/// Maps request discriminators to handlers.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<&'static str, Arc<dyn Route>>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes requests of type `R` to a handler, replacing any previous
    /// handler for that type.
    #[must_use]
    pub fn route<R, H>(mut self, handler: H) -> Self
    where
        R: RpcRequest,
        H: Handler<R>,
    {
        self.routes.insert(
            R::KIND.as_str(),
            Arc::new(TypedRoute {
                handler,
                _request: PhantomData,
            }),
        );
        self
    }

    /// Whether a discriminator has a handler.
    #[must_use]
    pub fn contains(&self, discriminator: &str) -> bool {
        self.routes.contains_key(discriminator)
    }

    /// The routed discriminators, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.routes.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Decodes a request body, runs its handler and encodes the reply.
    ///
    /// Returns `None` when no handler is routed for the discriminator.
    pub(crate) async fn invoke(
        &self,
        discriminator: &str,
        body: &[u8],
        caller: &CallerIdentity,
    ) -> Option<Result<Bytes, Error>> {
        let route = Arc::clone(self.routes.get(discriminator)?);

        Some(route.invoke(body, caller).await)
    }
}

impl Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("kinds", &self.kinds())
            .finish()
    }
}
