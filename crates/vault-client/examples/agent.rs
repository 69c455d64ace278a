//! Agent walkthrough.
//!
//! Starts an in-process mock vault on a Unix socket, then authenticates,
//! lists, retrieves, uses and releases credentials the way an agent would
//! against a real vault.

use anyhow::Context;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use sanctum_vault_client::{ErrorCode, RequestOptions, VaultClient};
use sanctum_vault_mock::{MockCredential, MockServer, MockVault};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let key = SigningKey::generate(&mut OsRng);

    let vault = MockVault::new();
    vault.register_agent("deploy-bot", key.verifying_key());
    vault.set_max_ttl(60);
    vault.add_credential(
        "openai/api_key",
        MockCredential::new("sk-demo")
            .with_type("api_key")
            .with_description("Inference key"),
    );
    vault.add_credential(
        "hr/payroll",
        MockCredential::new("restricted").allow("hr-bot"),
    );

    let dir = tempfile::tempdir()?;
    let socket = dir.path().join("vault.sock");
    let _server = MockServer::start_unix(vault, &socket)?;

    let client = VaultClient::connect_unix(&socket).await?;
    let options = RequestOptions::with_timeout(Duration::from_secs(5));

    let session = client
        .authenticate("deploy-bot", &key, options)
        .await
        .context("handshake failed")?;
    println!("Authenticated, session {:?}", session.session_id);

    for info in client.list(options).await? {
        println!(
            "  {} ({})",
            info.path,
            info.credential_type.as_deref().unwrap_or("untyped")
        );
    }

    let credential = client.retrieve("openai/api_key", 300, options).await?;
    println!(
        "Leased {} for {}s (asked for 300s): {credential:?}",
        credential.path(),
        credential.ttl()
    );

    let signed = client
        .use_credential(
            "openai/api_key",
            "sign_payload",
            json!({"payload": "POST /v1/chat"}),
            options,
        )
        .await?;
    println!("Signed without seeing the key: {}", signed.output);

    match client.retrieve("hr/payroll", 60, options).await {
        Err(e) if e.code() == Some(&ErrorCode::AccessDenied) => println!("As expected: {e}"),
        other => anyhow::bail!("expected access denied, got {other:?}"),
    }

    client.release_lease(credential.lease_id(), options).await?;
    client.close().await?;

    Ok(())
}
