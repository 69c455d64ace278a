//! Protocol layer for the vault RPC client.
//!
//! This module contains the core protocol definitions including:
//! - Length-prefixed framing
//! - Request and response envelopes
//! - The JSON payload codec
//! - Per-call options

pub mod codec;
pub mod framing;
pub mod message;
pub mod options;

pub use framing::{FrameCodec, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use message::{RequestId, RpcRequest, RpcResponse};
pub use options::RequestOptions;
