//! RPC client implementation.
//!
//! One [`RpcClient`] owns one connection. Every call holds a single exclusive
//! section from writing its request frame until its response frame has been
//! read, so exchanges never interleave on the wire. Callers queue for that
//! section in arrival order.

use crate::error::{CodecError, ConnectionError, Error, ExchangePhase, ProtocolError, Result};
use crate::protocol::{FrameCodec, RequestId, RequestOptions, RpcRequest, RpcResponse, codec};
use crate::transport::stream::{BoxedTransport, Endpoint, Transport};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::Framed;
use tracing::{Span, debug, instrument, warn};

/// Configuration for the RPC client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Timeout applied to calls that carry no deadline of their own.
    pub default_timeout: Option<Duration>,
    /// Maximum frame payload size in either direction.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            default_timeout: None,
            max_frame_size: crate::protocol::MAX_FRAME_SIZE,
        }
    }
}

/// Builder for creating RPC clients.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    endpoint: Option<Endpoint>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the given endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Connect over a Unix-domain socket.
    #[must_use]
    pub fn unix_socket(self, path: impl Into<PathBuf>) -> Self {
        self.endpoint(Endpoint::Unix(path.into()))
    }

    /// Connect over TCP.
    #[must_use]
    pub fn tcp_addr(self, addr: impl Into<String>) -> Self {
        self.endpoint(Endpoint::Tcp(addr.into()))
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the timeout for calls made without an explicit deadline.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Set the maximum frame size.
    #[must_use]
    pub const fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Connect and build the RPC client.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint was set or the connection fails.
    pub async fn build(self) -> Result<RpcClient> {
        let endpoint = self.endpoint.ok_or_else(|| {
            Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "vault endpoint not specified",
            ))
        })?;

        let stream = endpoint.connect(self.config.connect_timeout).await?;
        Ok(RpcClient::with_transport(
            stream,
            endpoint.to_string(),
            self.config,
        ))
    }
}

/// State of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    /// Frames are aligned and the connection is usable.
    Healthy,
    /// An exchange was abandoned or failed; the stream may be misaligned.
    Poisoned,
    /// The client closed the connection.
    Closed,
}

/// Everything guarded by the exchange lock.
struct Exchange {
    framed: Framed<BoxedTransport, FrameCodec>,
    next_id: RequestId,
    health: ConnectionHealth,
}

impl Exchange {
    fn ensure_usable(&self) -> Result<()> {
        match self.health {
            ConnectionHealth::Healthy => Ok(()),
            ConnectionHealth::Poisoned => Err(Error::Connection(ConnectionError::Poisoned)),
            ConnectionHealth::Closed => Err(Error::Connection(ConnectionError::ShutDown)),
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn round_trip(&mut self, payload: Bytes) -> Result<Bytes> {
        self.framed.send(payload).await?;
        match self.framed.next().await {
            Some(frame) => frame,
            None => Err(ConnectionError::Closed.into()),
        }
    }
}

/// RPC client for making requests over a single connection.
pub struct RpcClient {
    exchange: Mutex<Exchange>,
    config: ClientConfig,
    peer: String,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("peer", &self.peer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to `endpoint` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(endpoint: Endpoint) -> Result<Self> {
        Self::builder().endpoint(endpoint).build().await
    }

    /// Wrap an already established stream.
    #[must_use]
    pub fn from_stream<T: Transport>(stream: T, config: ClientConfig) -> Self {
        Self::with_transport(Box::new(stream), "stream".to_string(), config)
    }

    fn with_transport(stream: BoxedTransport, peer: String, config: ClientConfig) -> Self {
        let codec = FrameCodec::new().with_max_frame_size(config.max_frame_size);
        Self {
            exchange: Mutex::new(Exchange {
                framed: Framed::new(stream, codec),
                next_id: 1,
                health: ConnectionHealth::Healthy,
            }),
            config,
            peer,
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connection state. Waits for any in-flight exchange.
    pub async fn health(&self) -> ConnectionHealth {
        self.exchange.lock().await.health
    }

    /// Send a request and wait for its result payload.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection fails or the deadline
    /// expires, a protocol error if the response is malformed, and
    /// [`Error::Vault`] if the server reports a structured error.
    #[instrument(skip(self, params, options), fields(peer = %self.peer, request_id))]
    pub async fn call<P>(&self, method: &str, params: &P, options: RequestOptions) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_json::to_value(params)
            .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
        let deadline = self.effective_deadline(options);

        let mut exchange = match deadline {
            Some(deadline) => timeout_at(deadline, self.exchange.lock())
                .await
                .map_err(|_| {
                    debug!("Deadline expired while queued for the connection");
                    Error::DeadlineExceeded {
                        phase: ExchangePhase::Queued,
                    }
                })?,
            None => self.exchange.lock().await,
        };
        // An uncontended lock resolves before the timer is polled.
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!("Deadline expired before the exchange started");
            return Err(Error::DeadlineExceeded {
                phase: ExchangePhase::Queued,
            });
        }
        exchange.ensure_usable()?;

        let id = exchange.allocate_id();
        Span::current().record("request_id", id);

        let request = RpcRequest {
            id,
            method: method.to_string(),
            params,
        };
        let payload = codec::encode(&request)?;
        exchange
            .framed
            .codec()
            .check_len(payload.len())
            .map_err(Error::from)?;

        debug!("Sending request {} with method: {}", id, method);

        // Only a fully completed exchange clears this again.
        exchange.health = ConnectionHealth::Poisoned;

        let frame = match deadline {
            Some(deadline) => timeout_at(deadline, exchange.round_trip(payload))
                .await
                .map_err(|_| {
                    warn!("Deadline expired mid-exchange for request {id}; connection poisoned");
                    Error::DeadlineExceeded {
                        phase: ExchangePhase::InFlight,
                    }
                })?,
            None => exchange.round_trip(payload).await,
        }
        .inspect_err(|e| warn!("Exchange for request {id} failed: {e}"))?;

        let response: RpcResponse = codec::decode(&frame)?;
        if response.id != id {
            warn!(
                "Response id {} does not match request {}; connection poisoned",
                response.id, id
            );
            return Err(ProtocolError::IdMismatch {
                expected: id,
                actual: response.id,
            }
            .into());
        }

        let outcome = response.into_outcome();
        if !matches!(&outcome, Err(e) if e.is_protocol()) {
            exchange.health = ConnectionHealth::Healthy;
        }
        drop(exchange);

        match &outcome {
            Ok(_) => debug!("Request {} completed", id),
            Err(e) => debug!("Request {} failed: {}", id, e),
        }
        outcome
    }

    /// Send a request and decode its result payload as `R`.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call), plus a codec error if the result does
    /// not have the expected shape.
    pub async fn call_as<P, R>(&self, method: &str, params: &P, options: RequestOptions) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.call(method, params, options).await?;
        serde_json::from_value(value).map_err(|e| {
            CodecError::DeserializationFailed {
                method: method.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Close the connection.
    ///
    /// Waits for an in-flight exchange to finish first. Closing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if shutting down the stream fails.
    pub async fn close(&self) -> Result<()> {
        let mut exchange = self.exchange.lock().await;
        if exchange.health == ConnectionHealth::Closed {
            return Ok(());
        }
        exchange.health = ConnectionHealth::Closed;
        debug!("Closing connection to {}", self.peer);
        exchange.framed.get_mut().shutdown().await?;
        Ok(())
    }

    fn effective_deadline(&self, options: RequestOptions) -> Option<Instant> {
        options.deadline().or_else(|| {
            self.config
                .default_timeout
                .map(|timeout| Instant::now() + timeout)
        })
    }
}
