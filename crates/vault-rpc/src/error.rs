//! Error types for the vault RPC layer.
//!
//! Failures fall into three classes that callers can tell apart without
//! string matching: transport failures (the byte stream broke or a deadline
//! expired), protocol failures (the peer sent something that is not a valid
//! frame or response), and vault failures (the server answered with a
//! structured [`VaultError`]).

use crate::protocol::message::RequestId;
use crate::vault_error::{ErrorCode, VaultError};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-related errors.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Protocol-level errors.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Codec errors while serializing request parameters or typed results.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Structured error reported by the vault.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The caller's deadline expired.
    #[error("Deadline exceeded while {phase}")]
    DeadlineExceeded {
        /// How far the exchange had progressed.
        phase: ExchangePhase,
    },

    /// Generic I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The stream failed, was closed, or a deadline expired.
    Transport,
    /// The peer violated the framing or message contract.
    Protocol,
    /// The vault reported a structured error.
    Vault,
    /// The request could not be built locally.
    Client,
}

/// Progress of a request/response exchange when it was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Still queued behind other callers; nothing was sent.
    Queued,
    /// The request may have been written, the response was not fully read.
    InFlight,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("waiting for the connection"),
            Self::InFlight => f.write_str("exchanging frames"),
        }
    }
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Connection(_) | Self::DeadlineExceeded { .. } | Self::Io(_) => {
                ErrorClass::Transport
            }
            Self::Protocol(_) | Self::Codec(CodecError::DeserializationFailed { .. }) => {
                ErrorClass::Protocol
            }
            Self::Codec(CodecError::SerializationFailed(_)) => ErrorClass::Client,
            Self::Vault(_) => ErrorClass::Vault,
        }
    }

    /// Whether the failure happened on the transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.class(), ErrorClass::Transport)
    }

    /// Whether the peer violated the protocol.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self.class(), ErrorClass::Protocol)
    }

    /// The structured vault error, if the server reported one.
    #[must_use]
    pub const fn vault_error(&self) -> Option<&VaultError> {
        match self {
            Self::Vault(err) => Some(err),
            _ => None,
        }
    }

    /// The stable vault error code, if the server reported one.
    #[must_use]
    pub const fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Vault(err) => Some(&err.code),
            _ => None,
        }
    }
}

/// Connection-specific errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Failed to establish connection.
    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        /// The endpoint we tried to connect to.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Connecting took longer than the configured timeout.
    #[error("Timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout {
        /// The endpoint we tried to connect to.
        endpoint: String,
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// The peer closed the stream before a response arrived.
    #[error("Connection closed unexpectedly")]
    Closed,

    /// The client closed the connection.
    #[error("Connection has been shut down")]
    ShutDown,

    /// An earlier exchange was abandoned or failed mid-frame.
    #[error("Connection is poisoned by an incomplete exchange; reconnect")]
    Poisoned,
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame header declared more bytes than allowed.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared size of the frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame with {buffered} bytes buffered")]
    TruncatedFrame {
        /// Bytes of the partial frame already received.
        buffered: usize,
    },

    /// A frame payload was not a valid message.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The response id did not match the request in flight.
    #[error("response id {actual} does not match request id {expected}")]
    IdMismatch {
        /// Id of the request that was sent.
        expected: RequestId,
        /// Id carried by the response.
        actual: RequestId,
    },

    /// The error payload of a response could not be decoded.
    #[error("failed to parse error response: {0}")]
    MalformedError(String),
}

/// Codec-related errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Request parameters could not be serialized.
    #[error("Failed to serialize: {0}")]
    SerializationFailed(String),

    /// A result payload did not have the shape the method promises.
    #[error("Failed to deserialize result of {method}: {reason}")]
    DeserializationFailed {
        /// The method whose result was being decoded.
        method: String,
        /// Why decoding failed.
        reason: String,
    },
}
