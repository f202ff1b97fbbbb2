use crate::correlation::{CorrelationTable, CorrelationToken, PendingWaiter};
use crate::dispatch::{DispatchLoop, DispatchStats};
use crate::error::{Error, Result};
use crate::protocol::{
    AddRequest, CallerIdentity, Entity, GetAllRequest, GetReply, GetRequest, RemoveRequest,
    RequestEnvelope, RpcReply, RpcRequest, encode_request,
};
use crate::publisher::Publisher;

use std::fmt::{self, Debug};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use qq_messaging::Transport;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Configuration for the RPC client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Work queue requests are published to.
    pub queue: String,
    /// Default deadline for a reply. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Identity attached to requests unless overridden per call.
    pub caller: CallerIdentity,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            queue: "rpc_queue".to_string(),
            request_timeout: Some(Duration::from_secs(5)),
            caller: CallerIdentity::anonymous(),
        }
    }
}

impl ClientConfig {
    /// Set the work queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the default reply deadline. `None` waits indefinitely.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default caller identity.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<CallerIdentity>) -> Self {
        self.caller = caller.into();
        self
    }
}

/// Per-call overrides of the client configuration.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Reply deadline for this call, instead of the client default.
    pub timeout: Option<Duration>,
    /// Caller identity for this call, instead of the client default.
    pub caller: Option<CallerIdentity>,
}

impl RequestOptions {
    /// Set the reply deadline for this call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the caller identity for this call.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<CallerIdentity>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// Removes a registration from the table unless it was settled.
struct Reclaim {
    table: Arc<CorrelationTable>,
    token: Option<CorrelationToken>,
}

impl Reclaim {
    const fn new(table: Arc<CorrelationTable>, token: CorrelationToken) -> Self {
        Self {
            table,
            token: Some(token),
        }
    }

    fn disarm(&mut self) {
        self.token = None;
    }

    fn take(&mut self) -> Option<PendingWaiter> {
        let token = self.token.take()?;
        self.table.take_and_remove(token.as_str())
    }
}

impl Drop for Reclaim {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if self.table.take_and_remove(token.as_str()).is_some() {
                debug!(%token, "reclaimed abandoned request");
            }
        }
    }
}

/// Handle to a published request whose reply has not been awaited yet.
///
/// Await it (or call [`PendingReply::wait`]) to get the reply. Dropping it
/// unresolved removes the request from the correlation table.
pub struct PendingReply<R: RpcReply> {
    token: CorrelationToken,
    receiver: oneshot::Receiver<Result<R>>,
    reclaim: Reclaim,
    timeout: Option<Duration>,
    shutdown_token: CancellationToken,
}

impl<R: RpcReply> PendingReply<R> {
    /// The correlation token of the request.
    #[must_use]
    pub const fn token(&self) -> &CorrelationToken {
        &self.token
    }

    /// Waits for the reply, the deadline or client shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the deadline passes, the client shuts down, or the
    /// reply does not decode into the expected shape.
    pub async fn wait(mut self) -> Result<R> {
        let timeout = self.timeout;
        let expiry = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let fault = tokio::select! {
            biased;
            outcome = &mut self.receiver => {
                self.reclaim.disarm();
                return outcome.unwrap_or(Err(Error::Abandoned));
            }
            () = self.shutdown_token.cancelled() => Error::ShuttingDown,
            () = expiry => Error::Timeout(timeout.unwrap_or_default()),
        };

        if self.reclaim.take().is_some() {
            debug!(token = %self.token, error = %fault, "request abandoned");
            return Err(fault);
        }

        // The dispatch loop already claimed the waiter, so its delivery is
        // in flight and must not be lost.
        (&mut self.receiver)
            .await
            .unwrap_or(Err(Error::Abandoned))
    }
}

impl<R: RpcReply> IntoFuture for PendingReply<R> {
    type Output = Result<R>;
    type IntoFuture = BoxFuture<'static, Result<R>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl<R: RpcReply> Debug for PendingReply<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("token", &self.token)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// RPC client for making requests.
///
/// Cloning yields another handle on the same client: the same reply queue,
/// correlation table and dispatch task.
#[derive(Clone, Debug)]
pub struct RpcClient<T: Transport> {
    client_id: String,
    config: ClientConfig,
    dispatch_handle: Arc<Mutex<Option<JoinHandle<DispatchStats>>>>,
    publisher: Publisher<T>,
    reply_queue: String,
    shutdown_token: CancellationToken,
    table: Arc<CorrelationTable>,
}

impl<T: Transport> RpcClient<T> {
    /// Creates a client with its own reply queue and starts its dispatch
    /// loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply queue cannot be consumed.
    pub async fn connect(transport: T, config: ClientConfig) -> Result<Self> {
        let client_id = Uuid::new_v4().simple().to_string();
        let reply_queue = format!("{}_reply_{client_id}", config.queue);

        let consumer = transport
            .consume(&reply_queue)
            .await
            .map_err(|e| Error::Consume {
                destination: reply_queue.clone(),
                source: Box::new(e),
            })?;

        let table = Arc::new(CorrelationTable::new());
        let shutdown_token = CancellationToken::new();

        let dispatch = DispatchLoop::new(consumer, Arc::clone(&table));
        let dispatch_handle = tokio::spawn(dispatch.run(shutdown_token.clone()));

        info!(%client_id, queue = %config.queue, %reply_queue, "RPC client connected");

        Ok(Self {
            client_id,
            config,
            dispatch_handle: Arc::new(Mutex::new(Some(dispatch_handle))),
            publisher: Publisher::new(transport),
            reply_queue,
            shutdown_token,
            table,
        })
    }

    /// The unique id of this client.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The destination replies to this client are published to.
    #[must_use]
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Sends a request and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be published, no reply arrives
    /// before the deadline, or the reply does not decode.
    pub async fn call<R: RpcRequest>(&self, request: R) -> Result<R::Reply> {
        self.call_with_options(request, RequestOptions::default())
            .await
    }

    /// Sends a request with per-call options and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be published, no reply arrives
    /// before the deadline, or the reply does not decode.
    pub async fn call_with_options<R: RpcRequest>(
        &self,
        request: R,
        options: RequestOptions,
    ) -> Result<R::Reply> {
        self.send_with_options(request, options).await?.wait().await
    }

    /// Sends a request and returns a handle to its reply without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded or published.
    pub async fn send<R: RpcRequest>(&self, request: R) -> Result<PendingReply<R::Reply>> {
        self.send_with_options(request, RequestOptions::default())
            .await
    }

    /// Sends a request with per-call options and returns a handle to its
    /// reply without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded or published.
    #[instrument(skip(self, request, options), fields(kind = R::KIND.as_str()))]
    pub async fn send_with_options<R: RpcRequest>(
        &self,
        request: R,
        options: RequestOptions,
    ) -> Result<PendingReply<R::Reply>> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let body = encode_request(&request)?;
        let token = CorrelationToken::generate();

        let (waiter, receiver) = PendingWaiter::new::<R::Reply>();
        self.table.register(token.clone(), waiter)?;
        let mut reclaim = Reclaim::new(Arc::clone(&self.table), token.clone());

        let envelope = RequestEnvelope {
            token: token.clone(),
            reply_to: self.reply_queue.clone(),
            caller: options.caller.unwrap_or_else(|| self.config.caller.clone()),
            body,
        };

        if let Err(e) = self
            .publisher
            .publish_request(&self.config.queue, envelope)
            .await
        {
            error!(%token, error = %e, "failed to publish request");
            reclaim.take();
            return Err(e);
        }

        debug!(%token, pending = self.table.len(), "request published");

        Ok(PendingReply {
            token,
            receiver,
            reclaim,
            timeout: options.timeout.or(self.config.request_timeout),
            shutdown_token: self.shutdown_token.clone(),
        })
    }

    /// Stores a value. Returns whether it was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn add(&self, key: impl Into<String>, value: impl Into<String>) -> Result<bool> {
        Ok(self.call(AddRequest::new(key, value)).await?.added)
    }

    /// Deletes a key. Returns whether a value was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn remove(&self, key: impl Into<String>) -> Result<bool> {
        Ok(self.call(RemoveRequest::new(key)).await?.removed)
    }

    /// Looks up a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails. A missing key is `Ok(None)`.
    pub async fn get(&self, key: impl Into<String>) -> Result<Option<Entity>> {
        let key = key.into();
        let reply = self.call(GetRequest::new(key.clone())).await?;

        Ok(reply.value.map(|value| Entity { key, value }))
    }

    /// Sends a lookup and returns a handle to its reply without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be published.
    pub async fn get_async(&self, key: impl Into<String>) -> Result<PendingReply<GetReply>> {
        self.send(GetRequest::new(key)).await
    }

    /// Lists every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_all(&self) -> Result<Vec<Entity>> {
        Ok(self.call(GetAllRequest {}).await?.entities)
    }

    /// Stops the dispatch loop. Outstanding calls fail with
    /// [`Error::ShuttingDown`] and new calls are rejected.
    ///
    /// Returns the dispatch loop's counters the first time it is called.
    pub async fn shutdown(&self) -> Option<DispatchStats> {
        self.shutdown_token.cancel();

        let handle = self.dispatch_handle.lock().take()?;
        match handle.await {
            Ok(stats) => {
                info!(client_id = %self.client_id, ?stats, "RPC client shut down");
                Some(stats)
            }
            Err(e) => {
                error!(client_id = %self.client_id, error = %e, "dispatch task failed");
                None
            }
        }
    }
}
