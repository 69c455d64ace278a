//! Length-prefixed JSON RPC for talking to a Sanctum vault.
//!
//! This crate provides the wire layer shared by the vault client and test
//! servers: framing, request/response envelopes, structured vault errors, and
//! a dispatcher that runs one request/response exchange at a time over a
//! single connection.
//!
//! # Features
//!
//! - **Framing**: 4-byte big-endian length prefix, 16 MiB ceiling
//! - **Serialized exchanges**: concurrent callers queue for the connection
//! - **Deadlines**: every call can be bounded; abandoned exchanges poison the
//!   connection instead of desynchronizing it
//! - **Typed failures**: transport, protocol and vault errors stay distinct
//!
//! # Example
//!
//! ```no_run
//! use sanctum_vault_rpc::{RequestOptions, RpcClient};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::builder()
//!         .unix_socket("/run/sanctum/vault.sock")
//!         .build()
//!         .await?;
//!
//!     let listing = client
//!         .call(
//!             "credential.list",
//!             &json!({}),
//!             RequestOptions::with_timeout(Duration::from_secs(5)),
//!         )
//!         .await?;
//!
//!     println!("{listing}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod protocol;
pub mod transport;
pub mod vault_error;

// Re-export commonly used types
pub use error::{
    CodecError, ConnectionError, Error, ErrorClass, ExchangePhase, ProtocolError, Result,
};
pub use protocol::{
    FrameCodec, MAX_FRAME_SIZE, RequestId, RequestOptions, RpcRequest, RpcResponse, codec,
};
pub use transport::{
    ClientBuilder, ClientConfig, ConnectionHealth, Endpoint, ParseEndpointError, RpcClient,
    Transport,
};
pub use vault_error::{ErrorCode, VaultError};

// Re-export dependencies that are part of our public API
pub use bytes::Bytes;
pub use serde_json::Value;
