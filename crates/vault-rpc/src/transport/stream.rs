//! Byte streams the client can run over.

use crate::error::{ConnectionError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::debug;

/// A bidirectional byte stream usable as a transport.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased transport owned by a client.
pub type BoxedTransport = Box<dyn Transport>;

/// Where a vault listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Unix-domain stream socket.
    Unix(PathBuf),
    /// TCP address in `host:port` form.
    Tcp(String),
}

impl Endpoint {
    /// Open a stream to this endpoint.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the endpoint refuses the connection or
    /// does not answer within `connect_timeout`.
    pub async fn connect(&self, connect_timeout: Duration) -> Result<BoxedTransport> {
        debug!("Connecting to {}", self);

        let connected = match self {
            #[cfg(unix)]
            Self::Unix(path) => timeout(connect_timeout, tokio::net::UnixStream::connect(path))
                .await
                .map(|res| res.map(|stream| Box::new(stream) as BoxedTransport)),
            #[cfg(not(unix))]
            Self::Unix(_) => {
                return Err(ConnectionError::ConnectFailed {
                    endpoint: self.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "unix sockets are not available on this platform",
                    ),
                }
                .into());
            }
            Self::Tcp(addr) => timeout(connect_timeout, tokio::net::TcpStream::connect(addr))
                .await
                .map(|res| {
                    res.and_then(|stream| {
                        stream.set_nodelay(true)?;
                        Ok(Box::new(stream) as BoxedTransport)
                    })
                }),
        };

        match connected {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ConnectionError::ConnectFailed {
                endpoint: self.to_string(),
                source,
            }
            .into()),
            Err(_) => Err(ConnectionError::ConnectTimeout {
                endpoint: self.to_string(),
                timeout: connect_timeout,
            }
            .into()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// Error returned when an endpoint string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid endpoint {0:?}: expected unix:<path>, tcp:<host:port>, an absolute path or host:port")]
pub struct ParseEndpointError(String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ParseEndpointError(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            return parse_host_port(addr).ok_or_else(|| ParseEndpointError(s.to_string()));
        }
        if s.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(s)));
        }
        parse_host_port(s).ok_or_else(|| ParseEndpointError(s.to_string()))
    }
}

fn parse_host_port(addr: &str) -> Option<Endpoint> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return None;
    }
    Some(Endpoint::Tcp(addr.to_string()))
}
