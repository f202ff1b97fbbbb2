mod router;

pub use router::{Handler, Router};

use crate::error::{Error, Result};
use crate::protocol::{ReplyEnvelope, RequestEnvelope, RequestKind, peek_discriminator};
use crate::publisher::Publisher;

use std::sync::Arc;

use qq_messaging::{Consumer, Message, Transport};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, error, info, warn};

/// Configuration for the RPC server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Work queue requests are consumed from.
    pub queue: String,
    /// Number of worker tasks competing on the work queue.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue: "rpc_queue".to_string(),
            workers: 20,
        }
    }
}

impl ServerConfig {
    /// Set the work queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// What a worker did with one inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Processed {
    Replied,
    Dropped,
}

struct Worker<T: Transport> {
    id: usize,
    publisher: Publisher<T>,
    router: Arc<Router>,
}

impl<T: Transport> Worker<T> {
    async fn run<C: Consumer>(self, consumer: C, shutdown_token: CancellationToken) {
        debug!(worker = self.id, "worker started");

        loop {
            tokio::select! {
                biased;
                () = shutdown_token.cancelled() => {
                    debug!(worker = self.id, "shutdown token cancelled, exiting worker loop");
                    break;
                }
                message = consumer.next() => {
                    let Some(message) = message else {
                        debug!(worker = self.id, "work queue closed, exiting worker loop");
                        break;
                    };

                    self.process(message).await;
                }
            }
        }
    }

    async fn process(&self, message: Message) -> Processed {
        let discriminator = match peek_discriminator(&message.payload) {
            Ok(discriminator) => discriminator,
            Err(e) => {
                warn!(error = %e, "dropping request with unreadable body");
                return Processed::Dropped;
            }
        };

        let kind = match RequestKind::from_discriminator(&discriminator) {
            Some(kind) if self.router.contains(kind.as_str()) => kind,
            _ => {
                let e = Error::UnknownMessageType(discriminator);
                warn!(error = %e, "dropping request, no reply sent");
                return Processed::Dropped;
            }
        };

        let envelope = match RequestEnvelope::from_message(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%kind, error = %e, "dropping request with incomplete envelope");
                return Processed::Dropped;
            }
        };

        let span = debug_span!(
            "request",
            %kind,
            token = %envelope.token,
            caller = %envelope.caller,
        );

        self.reply(kind, envelope).instrument(span).await
    }

    async fn reply(&self, kind: RequestKind, envelope: RequestEnvelope) -> Processed {
        debug!("handling request");

        let body = match self
            .router
            .invoke(kind.as_str(), &envelope.body, &envelope.caller)
            .await
        {
            Some(Ok(body)) => body,
            Some(Err(e)) => {
                error!(error = %e, "request failed, no reply sent");
                return Processed::Dropped;
            }
            None => {
                warn!("route disappeared, no reply sent");
                return Processed::Dropped;
            }
        };

        let reply = ReplyEnvelope {
            token: envelope.token,
            body,
        };

        match self.publisher.publish_reply(&envelope.reply_to, reply).await {
            Ok(()) => {
                debug!(reply = %kind.reply(), reply_to = %envelope.reply_to, "reply published");
                Processed::Replied
            }
            Err(e) => {
                error!(error = %e, "failed to publish reply");
                Processed::Dropped
            }
        }
    }
}

/// Serves requests from a work queue with a fixed pool of workers.
#[derive(Debug)]
pub struct RpcServer<T: Transport> {
    config: ServerConfig,
    router: Arc<Router>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    transport: T,
}

impl<T: Transport> RpcServer<T> {
    /// Creates a server. Nothing is consumed until [`RpcServer::start`].
    pub fn new(transport: T, config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
            transport,
        }
    }

    /// Starts the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no workers, the work queue cannot be
    /// consumed, or the server was already started or shut down.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        if self.config.workers == 0 {
            return Err(Error::InvalidConfig("server needs at least one worker"));
        }

        let consumer = self
            .transport
            .consume(&self.config.queue)
            .await
            .map_err(|e| Error::Consume {
                destination: self.config.queue.clone(),
                source: Box::new(e),
            })?;

        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                publisher: Publisher::new(self.transport.clone()),
                router: Arc::clone(&self.router),
            };

            self.task_tracker
                .spawn(worker.run(consumer.clone(), self.shutdown_token.clone()));
        }

        self.task_tracker.close();

        info!(
            queue = %self.config.queue,
            workers = self.config.workers,
            kinds = ?self.router.kinds(),
            "RPC server started"
        );

        Ok(())
    }

    /// Stops the workers and waits for them to finish. A request already
    /// being handled is completed first.
    pub async fn shutdown(&self) {
        info!("shutting down RPC server");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("RPC server shut down");
    }

    /// Waits until every worker has exited, either because the work queue
    /// closed or because of [`RpcServer::shutdown`].
    pub async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}
