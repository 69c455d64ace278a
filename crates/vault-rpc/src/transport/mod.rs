//! Transport layer for the vault RPC client.
//!
//! This module owns the byte stream and the request/response exchange
//! running over it.

pub mod client;
pub mod stream;

pub use client::{ClientBuilder, ClientConfig, ConnectionHealth, RpcClient};
pub use stream::{BoxedTransport, Endpoint, ParseEndpointError, Transport};
