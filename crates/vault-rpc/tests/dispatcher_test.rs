//! Integration tests for the request/response dispatcher over a Unix socket.

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use sanctum_vault_rpc::{
    ConnectionError, ConnectionHealth, Error, ExchangePhase, FrameCodec, ProtocolError,
    RequestOptions, RpcClient, RpcRequest, RpcResponse, codec,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing_test::traced_test;

/// Serves one connection, answering every request with its own id and
/// method. Fails if a second request shows up before the first is answered.
async fn spawn_echo_server(
    delay: Duration,
) -> (tempfile::TempDir, PathBuf, Arc<Mutex<Vec<RpcRequest>>>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::new());

        while let Some(frame) = framed.next().await {
            let request: RpcRequest = codec::decode(&frame.unwrap()).unwrap();

            // Nothing else may arrive while this exchange is open
            let overlap = tokio::time::timeout(delay, framed.next()).await;
            assert!(overlap.is_err(), "request frames overlapped on the wire");

            let response = RpcResponse::success(
                request.id,
                json!({"id": request.id, "method": request.method}),
            );
            log.lock().await.push(request);
            framed.send(codec::encode(&response).unwrap()).await.unwrap();
        }
    });

    (dir, path, seen)
}

#[tokio::test]
#[traced_test]
async fn test_concurrent_calls_are_serialized() {
    let (_dir, path, seen) = spawn_echo_server(Duration::from_millis(20)).await;
    let client = Arc::new(RpcClient::builder().unix_socket(&path).build().await.unwrap());

    let mut handles = Vec::new();
    for n in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client
                .call("credential.retrieve", &json!({"path": format!("p/{n}"), "ttl": 60}), RequestOptions::new())
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result["method"], "credential.retrieve");
        ids.push(result["id"].as_u64().unwrap());
    }

    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());

    // Ids went out on the wire in allocation order
    let wire: Vec<u64> = seen.lock().await.iter().map(|r| r.id).collect();
    assert_eq!(wire, (1..=8).collect::<Vec<_>>());
    assert!(logs_contain("Sending request"));
}

#[tokio::test]
async fn test_deadline_while_queued_sends_nothing() {
    let (_dir, path, seen) = spawn_echo_server(Duration::from_millis(300)).await;
    let client = Arc::new(RpcClient::builder().unix_socket(&path).build().await.unwrap());

    let slow = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .call("credential.list", &json!({}), RequestOptions::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = client
        .call(
            "credential.list",
            &json!({}),
            RequestOptions::with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DeadlineExceeded {
            phase: ExchangePhase::Queued
        }
    ));

    slow.await.unwrap().unwrap();
    assert_eq!(seen.lock().await.len(), 1);
    assert_eq!(client.health().await, ConnectionHealth::Healthy);

    // The abandoned call never consumed an id
    let next = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(next["id"], 2);
}

#[tokio::test]
async fn test_oversized_response_header_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.sock");
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(&mut stream, FrameCodec::new());
        let _ = framed.next().await;
        drop(framed);

        let mut header = BytesMut::new();
        header.put_u32(20_000_000);
        header.put_slice(b"{\"id\":1,\"result\":null}");
        stream.write_all(&header).await.unwrap();
        // Keep the socket open so only the header check can fail the call
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = RpcClient::builder().unix_socket(&path).build().await.unwrap();
    let err = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::FrameTooLarge {
            size: 20_000_000,
            ..
        })
    ));
    assert_eq!(client.health().await, ConnectionHealth::Poisoned);

    let err = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(ConnectionError::Poisoned)));
}

#[tokio::test]
async fn test_malformed_json_response_is_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.sock");
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::new());
        let _ = framed.next().await;
        framed
            .send(Bytes::from_static(b"{\"id\": 1, \"result\": "))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = RpcClient::builder().unix_socket(&path).build().await.unwrap();
    let err = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_protocol());
    assert!(matches!(err, Error::Protocol(ProtocolError::InvalidPayload(_))));
}

#[tokio::test]
async fn test_typed_result_shape_mismatch() {
    let (_dir, path, _seen) = spawn_echo_server(Duration::from_millis(1)).await;
    let client = RpcClient::builder().unix_socket(&path).build().await.unwrap();

    let result: sanctum_vault_rpc::Result<Vec<String>> = client
        .call_as("credential.list", &json!({}), RequestOptions::new())
        .await;

    let err = result.unwrap_err();
    assert!(err.is_protocol());
    assert!(matches!(err, Error::Codec(_)));
    // A shape mismatch does not desynchronize the stream
    assert_eq!(client.health().await, ConnectionHealth::Healthy);
}
