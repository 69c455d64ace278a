//! Tests for the mock vault's protocol handling, driven through the raw RPC
//! client.

use sanctum_vault_mock::{MockCredential, MockServer, MockVault, serve_stream};
use sanctum_vault_rpc::{ClientConfig, ErrorCode, RequestOptions, RpcClient, VaultError};
use serde_json::json;
use tracing_test::traced_test;

#[tokio::test]
async fn test_credential_calls_require_authentication() {
    let vault = MockVault::new();
    vault.add_credential("db/primary", MockCredential::new("hunter2"));

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve_stream(vault.clone(), server_io);
    let client = RpcClient::from_stream(client_io, ClientConfig::default());

    let err = client
        .call(
            "credential.retrieve",
            &json!({"path": "db/primary", "ttl": 60}),
            RequestOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(&ErrorCode::AuthFailed));
    assert_eq!(vault.active_leases(), 0);
}

#[tokio::test]
async fn test_unknown_agent_and_method() {
    let vault = MockVault::new();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve_stream(vault.clone(), server_io);
    let client = RpcClient::from_stream(client_io, ClientConfig::default());

    let err = client
        .call("auth.challenge", &json!({"agent": "ghost"}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::AuthFailed));

    let err = client
        .call("vault.explode", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::Other("METHOD_NOT_FOUND".to_string())));

    let methods: Vec<String> = vault.wire_log().into_iter().map(|(_, m)| m).collect();
    assert_eq!(methods, vec!["auth.challenge", "vault.explode"]);
}

#[tokio::test]
#[traced_test]
async fn test_injected_error_is_one_shot() {
    let vault = MockVault::new();
    vault.inject_error(
        "auth.challenge",
        VaultError::new("RATE_LIMITED", "slow down").with_suggestion("retry in 1s"),
    );

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve_stream(vault.clone(), server_io);
    let client = RpcClient::from_stream(client_io, ClientConfig::default());

    let err = client
        .call("auth.challenge", &json!({"agent": "ghost"}), RequestOptions::new())
        .await
        .unwrap_err();
    let vault_error = err.vault_error().unwrap();
    assert_eq!(vault_error.code, ErrorCode::RateLimited);
    assert_eq!(vault_error.suggestion.as_deref(), Some("retry in 1s"));
    assert!(logs_contain("Returning injected error"));

    // The next call reaches the real handler
    let err = client
        .call("auth.challenge", &json!({"agent": "ghost"}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::AuthFailed));
}

#[tokio::test]
async fn test_server_over_tcp_and_unix() {
    let vault = MockVault::new();

    let tcp = MockServer::start_tcp(vault.clone(), "127.0.0.1:0").await.unwrap();
    let client = RpcClient::connect(tcp.endpoint().clone()).await.unwrap();
    let err = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::AuthFailed));

    let dir = tempfile::tempdir().unwrap();
    let unix = MockServer::start_unix(vault.clone(), dir.path().join("vault.sock")).unwrap();
    let client = RpcClient::connect(unix.endpoint().clone()).await.unwrap();
    let err = client
        .call("credential.list", &json!({}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::AuthFailed));

    assert_eq!(vault.wire_log().len(), 2);
}
