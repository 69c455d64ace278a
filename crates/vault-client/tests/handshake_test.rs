//! Handshake tests against a scripted peer that inspects exactly what the
//! client puts on the wire.

use ed25519_dalek::{Signature, SigningKey, Verifier};
use futures::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use sanctum_vault_client::{AuthState, ClientConfig, Error, RequestOptions, VaultClient};
use sanctum_vault_rpc::{FrameCodec, RpcRequest, RpcResponse, codec};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

/// Answer each request with the next scripted result, forwarding every
/// request seen to the returned channel. Once the script runs out the peer
/// keeps reading without answering.
fn scripted_peer(script: Vec<Value>) -> (VaultClient, mpsc::UnboundedReceiver<RpcRequest>) {
    spawn_peer(script, true)
}

/// Like [`scripted_peer`], but the peer hangs up once the script runs out.
fn scripted_peer_then_hangup(
    script: Vec<Value>,
) -> (VaultClient, mpsc::UnboundedReceiver<RpcRequest>) {
    spawn_peer(script, false)
}

fn spawn_peer(
    script: Vec<Value>,
    linger: bool,
) -> (VaultClient, mpsc::UnboundedReceiver<RpcRequest>) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut framed = Framed::new(server_io, FrameCodec::new());
        for result in script {
            let Some(Ok(frame)) = framed.next().await else {
                return;
            };
            let request: RpcRequest = codec::decode(&frame).unwrap();
            let response = RpcResponse::success(request.id, result);
            seen_tx.send(request).unwrap();
            framed.send(codec::encode(&response).unwrap()).await.unwrap();
        }
        // Drain until the client hangs up
        while linger && framed.next().await.is_some() {}
    });

    (
        VaultClient::from_stream(client_io, ClientConfig::default()),
        seen_rx,
    )
}

#[tokio::test]
async fn test_signature_verifies_over_challenge_bytes() {
    let key = SigningKey::generate(&mut OsRng);
    let challenge = [7u8; 32];
    let (client, mut seen) = scripted_peer(vec![
        json!({"challenge": hex::encode(challenge)}),
        json!({"authenticated": true, "session_id": "sess-42"}),
    ]);

    let session = client
        .authenticate("agent-7", &key, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(session.session_id.as_deref(), Some("sess-42"));

    let challenge_req = seen.recv().await.unwrap();
    assert_eq!(challenge_req.method, "auth.challenge");
    assert_eq!(challenge_req.params, json!({"agent": "agent-7"}));

    let verify_req = seen.recv().await.unwrap();
    assert_eq!(verify_req.method, "auth.verify");
    assert_eq!(verify_req.params["agent"], "agent-7");

    let sig_bytes = hex::decode(verify_req.params["signature"].as_str().unwrap()).unwrap();
    let signature = Signature::from_slice(&sig_bytes).unwrap();
    assert!(key.verifying_key().verify(&challenge, &signature).is_ok());

    // Nothing resembling the private key went out
    let secret_hex = hex::encode(key.to_bytes());
    assert!(!verify_req.params.to_string().contains(&secret_hex));
    assert!(!challenge_req.params.to_string().contains(&secret_hex));
}

#[tokio::test]
async fn test_malformed_challenge_fails_before_verify() {
    let key = SigningKey::generate(&mut OsRng);
    let (client, mut seen) = scripted_peer(vec![json!({"challenge": "not-hex!"})]);

    let err = client
        .authenticate("agent-7", &key, RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidChallenge(_)));
    assert_eq!(client.auth_state(), AuthState::Rejected);

    assert_eq!(seen.recv().await.unwrap().method, "auth.challenge");
    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn test_absent_authenticated_flag_is_rejection() {
    let key = SigningKey::generate(&mut OsRng);
    let (client, _seen) = scripted_peer(vec![json!({"challenge": "00ff"}), json!({})]);

    let err = client
        .authenticate("agent-7", &key, RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthenticationRejected { .. }));
    assert_eq!(client.auth_state(), AuthState::Rejected);
    assert_eq!(client.session_id(), None);
}

#[tokio::test]
async fn test_list_surfaces_bare_paths() {
    let (client, mut seen) = scripted_peer(vec![json!([{"path": "openai/api_key"}])]);

    let listing = client.list(RequestOptions::new()).await.unwrap();

    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].path, "openai/api_key");

    let request = seen.recv().await.unwrap();
    assert_eq!(request.id, 1);
    assert_eq!(request.method, "credential.list");
    assert_eq!(request.params, json!({}));
}

#[tokio::test]
async fn test_release_accepts_empty_acknowledgement() {
    let (client, _seen) = scripted_peer(vec![Value::Null, json!({"released": true})]);

    client
        .release_lease("lease-1", RequestOptions::new())
        .await
        .unwrap();
    client
        .release_lease("lease-2", RequestOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verify_deadline_leaves_state_rejected() {
    let key = SigningKey::generate(&mut OsRng);
    let (client, mut seen) = scripted_peer(vec![json!({"challenge": "00ff"})]);

    let err = client
        .authenticate(
            "agent-7",
            &key,
            RequestOptions::with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(client.auth_state(), AuthState::Rejected);
    assert_eq!(client.session_id(), None);
    assert_eq!(seen.recv().await.unwrap().method, "auth.challenge");
}

#[tokio::test]
async fn test_dropped_handshake_leaves_state_rejected() {
    let key = SigningKey::generate(&mut OsRng);
    let (client, mut seen) = scripted_peer(vec![json!({"challenge": "00ff"})]);

    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        client.authenticate("agent-7", &key, RequestOptions::new()),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(client.auth_state(), AuthState::Rejected);
    assert_eq!(seen.recv().await.unwrap().method, "auth.challenge");
}

#[tokio::test]
async fn test_peer_hangup_mid_handshake_leaves_state_rejected() {
    let key = SigningKey::generate(&mut OsRng);
    let (client, _seen) = scripted_peer_then_hangup(vec![json!({"challenge": "00ff"})]);

    let err = client
        .authenticate("agent-7", &key, RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(client.auth_state(), AuthState::Rejected);
}
