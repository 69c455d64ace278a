//! Accept loop serving a [`MockVault`] over real sockets.

use crate::vault::{ConnectionSession, MockVault};

use futures::{SinkExt, StreamExt};
use sanctum_vault_rpc::{Endpoint, FrameCodec, Result, RpcRequest, RpcResponse, Transport, codec};
use std::path::Path;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

/// A running mock vault server. Stops accepting when dropped.
#[derive(Debug)]
pub struct MockServer {
    endpoint: Endpoint,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Listen on a Unix domain socket at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be bound.
    pub fn start_unix(vault: MockVault, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "Mock vault listening");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            serve_stream(vault.clone(), stream);
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            endpoint: Endpoint::Unix(path),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Listen on a TCP address. Use port 0 to pick a free port.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn start_tcp(vault: MockVault, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!(%local, "Mock vault listening");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            serve_stream(vault.clone(), stream);
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            endpoint: Endpoint::Tcp(local.to_string()),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Endpoint clients should connect to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Stop accepting new connections. Open connections keep being served.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            debug!("Mock vault shut down");
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Serve a single already-connected stream until the peer hangs up.
pub fn serve_stream<T: Transport>(vault: MockVault, stream: T) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let outcome = handle_connection(vault, stream).await;
        if let Err(e) = &outcome {
            warn!("Connection ended with error: {}", e);
        }
        outcome
    })
}

#[instrument(skip_all)]
async fn handle_connection<T: Transport>(vault: MockVault, stream: T) -> Result<()> {
    debug!("New connection");
    let mut framed = Framed::new(stream, FrameCodec::new());
    let mut session = ConnectionSession::default();

    while let Some(frame) = framed.next().await {
        let request: RpcRequest = codec::decode(&frame?)?;
        debug!(id = request.id, method = %request.method, "Received request");

        if let Some(delay) = vault.response_delay() {
            tokio::time::sleep(delay).await;
        }

        let response = match vault.dispatch(&mut session, &request) {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(vault_error) => RpcResponse::failure(request.id, &vault_error)?,
        };
        framed.send(codec::encode(&response)?).await?;
    }

    debug!("Connection closed by peer");
    Ok(())
}
