//! CLI binary to run and talk to the key/value RPC service.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use qq_messaging::Transport;
use qq_messaging_memory::MemoryTransport;
use qq_messaging_nats::{NatsTransport, NatsTransportOptions};
use qq_rpc::{ClientConfig, PendingReply, RpcClient, RpcServer, ServerConfig};
use qq_service::StoreService;
use qq_store_memory::MemoryStore;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// NATS transport error
    #[error(transparent)]
    Nats(#[from] qq_messaging_nats::Error),

    /// RPC error
    #[error(transparent)]
    Rpc(#[from] qq_rpc::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// In-process broker; client commands run against an in-process server
    Memory,
    /// NATS server
    Nats,
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Message bus to use
    #[arg(long, value_enum, default_value_t = TransportKind::Nats, env = "QQ_TRANSPORT")]
    transport: TransportKind,

    /// NATS server URL
    #[arg(long, default_value = "nats://localhost:4222", env = "QQ_NATS_URL")]
    nats_url: String,

    /// Work queue requests are published to
    #[arg(long, default_value = "rpc_queue", env = "QQ_QUEUE")]
    queue: String,

    /// Caller identity attached to requests
    #[arg(long, default_value = "", env = "QQ_USER_ID")]
    user_id: String,

    /// Reply deadline in milliseconds (0 waits indefinitely)
    #[arg(long, default_value_t = 5000, env = "QQ_TIMEOUT_MS")]
    timeout_ms: u64,

    /// Number of server workers
    #[arg(long, default_value = "20", env = "QQ_WORKERS")]
    workers: NonZeroUsize,

    /// Maximum log level
    #[arg(long, default_value_t = Level::WARN, env = "QQ_LOG_LEVEL")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Serve requests from an in-memory store until interrupted
    Serve,

    /// Store a value
    Add {
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Delete a key
    Remove {
        /// Key
        key: String,
    },

    /// Look up a key
    Get {
        /// Key
        key: String,
    },

    /// List every entry
    GetAll,

    /// Look up several keys concurrently
    BatchGet {
        /// Keys
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let timeout = (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms));

        ClientConfig::default()
            .with_queue(self.queue.clone())
            .with_request_timeout(timeout)
            .with_caller(self.user_id.as_str())
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_queue(self.queue.clone())
            .with_workers(self.workers.get())
    }
}

async fn shutdown_signal(shutdown_token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
            }
            _ => {
                warn!("failed to install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt signal");
    }

    info!("Shutting down");
    shutdown_token.cancel();
}

async fn serve<T: Transport>(transport: T, args: &Args) -> Result<(), Error> {
    let server = RpcServer::new(
        transport,
        args.server_config(),
        StoreService::new(MemoryStore::new()).router(),
    );
    server.start().await?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown_token.clone()));

    tokio::select! {
        () = shutdown_token.cancelled() => server.shutdown().await,
        () = server.wait() => warn!("work queue closed"),
    }

    Ok(())
}

async fn run_client<T: Transport>(transport: T, args: &Args) -> Result<(), Error> {
    let client = RpcClient::connect(transport, args.client_config()).await?;

    let result = run_command(&client, &args.command).await;
    client.shutdown().await;

    result
}

async fn run_command<T: Transport>(
    client: &RpcClient<T>,
    command: &Command,
) -> Result<(), Error> {
    match command {
        Command::Serve => {}
        Command::Add { key, value } => {
            println!("{}", client.add(key, value).await?);
        }
        Command::Remove { key } => {
            println!("{}", client.remove(key).await?);
        }
        Command::Get { key } => match client.get(key).await? {
            Some(entity) => println!("{}", entity.value),
            None => println!("<not found>"),
        },
        Command::GetAll => {
            for entity in client.get_all().await? {
                println!("{}\t{}", entity.key, entity.value);
            }
        }
        Command::BatchGet { keys } => {
            let mut handles = Vec::with_capacity(keys.len());
            for key in keys {
                handles.push(client.get_async(key).await?);
            }

            let replies = join_all(handles.into_iter().map(PendingReply::wait)).await;
            for (key, reply) in keys.iter().zip(replies) {
                match reply?.value {
                    Some(value) => println!("{key}\t{value}"),
                    None => println!("{key}\t<not found>"),
                }
            }
        }
    }

    Ok(())
}

async fn run<T: Transport>(transport: T, args: &Args) -> Result<(), Error> {
    match args.command {
        Command::Serve => serve(transport, args).await,
        _ => run_client(transport, args).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    match args.transport {
        TransportKind::Nats => {
            let transport = NatsTransport::connect(NatsTransportOptions {
                url: args.nats_url.clone(),
                ..NatsTransportOptions::default()
            })
            .await?;

            run(transport, &args).await
        }
        TransportKind::Memory => {
            let transport = MemoryTransport::new();

            if !matches!(args.command, Command::Serve) {
                // Nothing else shares this broker, so bring up a server for
                // the client to talk to.
                let server = RpcServer::new(
                    transport.clone(),
                    args.server_config(),
                    StoreService::new(MemoryStore::new()).router(),
                );
                server.start().await?;

                let result = run(transport, &args).await;
                server.shutdown().await;
                return result;
            }

            run(transport, &args).await
        }
    }
}
