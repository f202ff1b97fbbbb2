use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use qq_messaging::{Consumer, Transport};
use qq_messaging_memory::MemoryTransport;
use qq_rpc::protocol::{
    AddReply, AddRequest, GetReply, GetRequest, ReplyEnvelope, RequestEnvelope, decode_request,
    encode_reply,
};
use qq_rpc::{
    CallerIdentity, ClientConfig, Error, Handler, HandlerError, PendingReply, RequestOptions,
    Router, RpcClient, RpcServer, ServerConfig,
};
use rand::seq::SliceRandom;
use tokio::time::timeout;

/// Replies with the key it was asked for, tagged with the caller.
struct Echo {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler<GetRequest> for Echo {
    async fn handle(
        &self,
        request: GetRequest,
        caller: &CallerIdentity,
    ) -> Result<GetReply, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        Ok(GetReply {
            value: Some(format!("{caller}/{}", request.key)),
        })
    }
}

/// Always fails.
struct Broken;

#[async_trait]
impl Handler<AddRequest> for Broken {
    async fn handle(
        &self,
        _request: AddRequest,
        _caller: &CallerIdentity,
    ) -> Result<AddReply, HandlerError> {
        Err(HandlerError::Internal("disk on fire".to_string()))
    }
}

async fn echo_server(
    transport: &MemoryTransport,
    workers: usize,
) -> (RpcServer<MemoryTransport>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route::<GetRequest, _>(Echo {
            calls: Arc::clone(&calls),
        })
        .route::<AddRequest, _>(Broken);

    let server = RpcServer::new(
        transport.clone(),
        ServerConfig::default().with_workers(workers),
        router,
    );
    server.start().await.unwrap();

    (server, calls)
}

fn short_deadline() -> ClientConfig {
    ClientConfig::default().with_request_timeout(Some(Duration::from_millis(200)))
}

#[tokio::test]
async fn test_concurrent_calls_get_their_own_replies() {
    let transport = MemoryTransport::new();
    let (server, calls) = echo_server(&transport, 8).await;
    let client = RpcClient::connect(transport, ClientConfig::default().with_caller("dave"))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let reply = client.call(GetRequest::new(format!("key-{i}"))).await?;
                Ok::<_, Error>((i, reply))
            })
        })
        .collect();

    let results = timeout(Duration::from_secs(10), join_all(tasks))
        .await
        .expect("calls did not complete");

    for result in results {
        let (i, reply) = result.unwrap().unwrap();
        assert_eq!(reply.value, Some(format!("dave/key-{i}")));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 200);
    assert_eq!(client.pending(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shuffled_replies_are_not_cross_wired() {
    let transport = MemoryTransport::new();
    let requests = transport.consume("rpc_queue").await.unwrap();
    let client = RpcClient::connect(transport.clone(), ClientConfig::default())
        .await
        .unwrap();

    let mut pending = Vec::new();
    for i in 0..50 {
        pending.push((i, client.send(GetRequest::new(format!("{i}"))).await.unwrap()));
    }

    // Collect every request, then answer them in random order.
    let mut envelopes = Vec::new();
    for _ in 0..50 {
        let message = requests.next().await.unwrap();
        envelopes.push(RequestEnvelope::from_message(message).unwrap());
    }
    envelopes.shuffle(&mut rand::thread_rng());

    for envelope in envelopes {
        let request = decode_request::<GetRequest>(&envelope.body).unwrap();
        let reply = ReplyEnvelope {
            token: envelope.token,
            body: encode_reply(&GetReply {
                value: Some(request.key),
            })
            .unwrap(),
        };
        transport
            .publish(&envelope.reply_to, reply.into_message())
            .await
            .unwrap();
    }

    for (i, reply) in pending {
        let reply = timeout(Duration::from_secs(5), reply)
            .await
            .expect("reply did not arrive")
            .unwrap();
        assert_eq!(reply.value, Some(format!("{i}")));
    }

    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn test_duplicate_replies_resolve_once() {
    let transport = MemoryTransport::new();
    let requests = transport.consume("rpc_queue").await.unwrap();
    let client = RpcClient::connect(transport.clone(), ClientConfig::default())
        .await
        .unwrap();

    let pending = client.send(GetRequest::new("k")).await.unwrap();
    let envelope = RequestEnvelope::from_message(requests.next().await.unwrap()).unwrap();

    // Several responders race to answer the same request.
    let publishes: Vec<_> = (0..10)
        .map(|i| {
            let transport = transport.clone();
            let reply = ReplyEnvelope {
                token: envelope.token.clone(),
                body: encode_reply(&GetReply {
                    value: Some(format!("answer-{i}")),
                })
                .unwrap(),
            };
            let reply_to = envelope.reply_to.clone();
            tokio::spawn(async move { transport.publish(&reply_to, reply.into_message()).await })
        })
        .collect();
    for publish in join_all(publishes).await {
        publish.unwrap().unwrap();
    }

    let reply = timeout(Duration::from_secs(5), pending)
        .await
        .expect("reply did not arrive")
        .unwrap();
    assert!(reply.value.unwrap().starts_with("answer-"));

    // Let the dispatch loop drain the duplicates before stopping it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = client.shutdown().await.unwrap();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.orphaned, 9);
}

#[tokio::test]
async fn test_fan_out_with_handles() {
    let transport = MemoryTransport::new();
    let (server, _calls) = echo_server(&transport, 4).await;
    let client = RpcClient::connect(transport, ClientConfig::default())
        .await
        .unwrap();

    let keys = ["a", "b", "c", "d", "e"];
    let mut handles = Vec::new();
    for key in keys {
        handles.push(client.get_async(key).await.unwrap());
    }
    assert!(client.pending() <= keys.len());

    let replies = timeout(
        Duration::from_secs(5),
        join_all(handles.into_iter().map(PendingReply::wait)),
    )
    .await
    .expect("replies did not arrive");

    let values: Vec<_> = replies
        .into_iter()
        .map(|reply| reply.unwrap().value.unwrap())
        .collect();
    assert_eq!(
        values,
        vec![
            "anonymous/a",
            "anonymous/b",
            "anonymous/c",
            "anonymous/d",
            "anonymous/e"
        ]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_per_call_caller_identity() {
    let transport = MemoryTransport::new();
    let (server, _calls) = echo_server(&transport, 1).await;
    let client = RpcClient::connect(transport, ClientConfig::default().with_caller("erin"))
        .await
        .unwrap();

    let reply = client
        .call_with_options(
            GetRequest::new("k"),
            RequestOptions::default().with_caller("frank"),
        )
        .await
        .unwrap();
    assert_eq!(reply.value.as_deref(), Some("frank/k"));

    let entity = client.get("k").await.unwrap().unwrap();
    assert_eq!(entity.key, "k");
    assert_eq!(entity.value, "erin/k");

    server.shutdown().await;
}

#[tokio::test]
async fn test_handler_fault_times_out_and_reclaims() {
    let transport = MemoryTransport::new();
    let (server, _calls) = echo_server(&transport, 2).await;
    let client = RpcClient::connect(transport, short_deadline()).await.unwrap();

    let result = client.add("k", "v").await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(client.pending(), 0);

    // The server is still healthy.
    assert!(client.get("k").await.unwrap().is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_kind_times_out_and_reclaims() {
    let transport = MemoryTransport::new();
    let (server, calls) = echo_server(&transport, 2).await;
    let client = RpcClient::connect(transport, short_deadline()).await.unwrap();

    let result = client.remove("k").await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(client.pending(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_per_call_timeout_override() {
    let transport = MemoryTransport::new();
    let _requests = transport.consume("rpc_queue").await.unwrap();
    let client = RpcClient::connect(
        transport,
        ClientConfig::default().with_request_timeout(None),
    )
    .await
    .unwrap();

    let result = timeout(
        Duration::from_secs(5),
        client.call_with_options(
            GetRequest::new("k"),
            RequestOptions::default().with_timeout(Duration::from_millis(20)),
        ),
    )
    .await
    .expect("per-call deadline was ignored");

    assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_millis(20)));
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn test_shutdown_barrier_completes_in_flight_work() {
    let transport = MemoryTransport::new();
    let (server, calls) = echo_server(&transport, 3).await;
    let client = RpcClient::connect(transport.clone(), ClientConfig::default())
        .await
        .unwrap();

    assert!(client.get("before").await.unwrap().is_some());

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown barrier did not complete");
    timeout(Duration::from_secs(1), server.wait())
        .await
        .expect("workers still running after shutdown");

    // No worker is left to consume the work queue.
    let result = client
        .call_with_options(
            GetRequest::new("after"),
            RequestOptions::default().with_timeout(Duration::from_millis(100)),
        )
        .await;
    assert!(matches!(result, Err(Error::Publish { .. })));
    assert_eq!(client.pending(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Restarting a stopped server is refused.
    assert!(matches!(server.start().await, Err(Error::ShuttingDown)));
}
