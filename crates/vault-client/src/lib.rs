//! Agent-side client for the Sanctum credential vault.
//!
//! Agents authenticate with an Ed25519 challenge-response handshake, then
//! retrieve credentials under time-limited leases, list what they can see,
//! release leases early, or ask the vault to use a credential on their behalf
//! without ever receiving the secret.
//!
//! # Example
//!
//! ```no_run
//! use sanctum_vault_client::{RequestOptions, VaultClient, signing_key_from_hex};
//! use std::time::Duration;
//!
//! async fn example(key_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VaultClient::connect_unix("/run/sanctum/vault.sock").await?;
//!     let key = signing_key_from_hex(key_hex)?;
//!     let options = RequestOptions::with_timeout(Duration::from_secs(5));
//!
//!     client.authenticate("deploy-bot", &key, options).await?;
//!
//!     let credential = client.retrieve("openai/api_key", 300, options).await?;
//!     // use credential.value() ...
//!     client.release_lease(credential.lease_id(), options).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod commands;
pub mod error;

pub use auth::{AuthState, Session, sign_challenge, signing_key_from_hex};
pub use client::VaultClient;
pub use commands::{Credential, CredentialInfo, UseResult, VaultCommand};
pub use error::{Error, Result};

// Re-export the RPC surface callers need
pub use sanctum_vault_rpc::{
    ClientConfig, Endpoint, ErrorClass, ErrorCode, RequestOptions, VaultError,
};
