//! Vault client implementation.

use crate::auth::{AuthState, Session, sign_challenge};
use crate::commands::{
    ChallengeRequest, Credential, CredentialInfo, ListRequest, ReleaseRequest, RetrieveRequest,
    UseRequest, UseResult, VaultCommand, VerifyRequest,
};
use crate::error::{Error, Result};

use ed25519_dalek::SigningKey;
use parking_lot::RwLock;
use sanctum_vault_rpc::{
    ClientConfig, Endpoint, ErrorCode, RequestOptions, RpcClient, Transport, Value,
};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Client for a Sanctum vault.
///
/// Wraps a single [`RpcClient`] connection and tracks the agent
/// authentication state of that connection. All methods take `&self`, so the
/// client can be shared behind an `Arc`; requests from concurrent tasks are
/// serialized on the connection.
pub struct VaultClient {
    rpc: RpcClient,
    state: RwLock<AuthState>,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("rpc", &self.rpc)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl VaultClient {
    /// Connect to a vault endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established.
    pub async fn connect(endpoint: Endpoint) -> Result<Self> {
        Ok(Self::new(RpcClient::connect(endpoint).await?))
    }

    /// Connect to a vault over a Unix domain socket.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established.
    pub async fn connect_unix(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect(Endpoint::Unix(path.as_ref().to_path_buf())).await
    }

    /// Connect to a vault over TCP.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established.
    pub async fn connect_tcp(addr: impl Into<String>) -> Result<Self> {
        Self::connect(Endpoint::Tcp(addr.into())).await
    }

    /// Wrap an already-connected stream.
    #[must_use]
    pub fn from_stream<T: Transport>(stream: T, config: ClientConfig) -> Self {
        Self::new(RpcClient::from_stream(stream, config))
    }

    /// Wrap an existing RPC client. The connection starts unauthenticated.
    #[must_use]
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            rpc,
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    /// The underlying RPC client.
    #[must_use]
    pub const fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.state.read().clone()
    }

    /// Session identifier issued by the vault, if authenticated.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        match &*self.state.read() {
            AuthState::Authenticated(session) => session.session_id.clone(),
            _ => None,
        }
    }

    /// Authenticate as `agent` by signing a vault-issued challenge.
    ///
    /// The private key never leaves the process; only the signature over the
    /// decoded challenge bytes is sent. Calling this again restarts the
    /// handshake from the beginning.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChallenge`] if the challenge is not valid hex; no
    ///   verify request is sent in that case.
    /// - [`Error::AuthenticationRejected`] if the vault refuses the signature.
    /// - [`Error::Rpc`] for transport, protocol or vault failures.
    #[instrument(skip(self, signing_key, options))]
    pub async fn authenticate(
        &self,
        agent: &str,
        signing_key: &SigningKey,
        options: RequestOptions,
    ) -> Result<Session> {
        let guard = HandshakeGuard::start(&self.state);

        let challenge = self
            .execute(
                &ChallengeRequest {
                    agent: agent.to_string(),
                },
                options,
            )
            .await?;

        let signature = sign_challenge(signing_key, &challenge.challenge)?;
        guard.advance(AuthState::ChallengeSigned);

        let verdict = self
            .execute(
                &VerifyRequest {
                    agent: agent.to_string(),
                    signature: hex::encode(signature.to_bytes()),
                },
                options,
            )
            .await?;

        if !verdict.authenticated {
            warn!("Vault rejected signed challenge");
            return Err(Error::AuthenticationRejected {
                agent: agent.to_string(),
            });
        }

        let session = Session {
            agent: agent.to_string(),
            session_id: verdict.session_id,
        };
        guard.complete(session.clone());
        info!(session_id = ?session.session_id, "Authenticated");

        Ok(session)
    }

    /// Retrieve the credential at `path` under a lease of `ttl` seconds.
    ///
    /// The returned lease may be shorter than requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] with the vault's error, e.g. `ACCESS_DENIED` or
    /// `CREDENTIAL_NOT_FOUND`, or a transport or protocol failure.
    #[instrument(skip(self, options))]
    pub async fn retrieve(&self, path: &str, ttl: u64, options: RequestOptions) -> Result<Credential> {
        let credential = self
            .execute(
                &RetrieveRequest {
                    path: path.to_string(),
                    ttl,
                },
                options,
            )
            .await?;

        debug!(
            lease_id = credential.lease_id(),
            ttl = credential.ttl(),
            "Credential retrieved"
        );
        Ok(credential)
    }

    /// List the credentials visible to the authenticated agent.
    ///
    /// Never returns secret values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] on any failure.
    #[instrument(skip(self, options))]
    pub async fn list(&self, options: RequestOptions) -> Result<Vec<CredentialInfo>> {
        let listing = self
            .execute(&ListRequest::default(), options)
            .await?
            .unwrap_or_default();

        debug!(count = listing.len(), "Credentials listed");
        Ok(listing)
    }

    /// Release a lease before its TTL expires.
    ///
    /// Releasing twice is harmless. The vault may answer a repeat or an
    /// unknown lease with `LEASE_EXPIRED`, which callers can treat as
    /// already released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] with the vault's error, or a transport or
    /// protocol failure.
    #[instrument(skip(self, options))]
    pub async fn release_lease(&self, lease_id: &str, options: RequestOptions) -> Result<()> {
        self.execute(
            &ReleaseRequest {
                lease_id: lease_id.to_string(),
            },
            options,
        )
        .await?;

        debug!("Lease released");
        Ok(())
    }

    /// Have the vault perform `operation` with the credential at `path`
    /// without ever returning the secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] on any failure.
    #[instrument(skip(self, params, options))]
    pub async fn use_credential(
        &self,
        path: &str,
        operation: &str,
        params: Value,
        options: RequestOptions,
    ) -> Result<UseResult> {
        let result = self
            .execute(
                &UseRequest {
                    path: path.to_string(),
                    operation: operation.to_string(),
                    params,
                },
                options,
            )
            .await?;

        debug!(success = result.success, "Credential used");
        Ok(result)
    }

    /// Send a typed command and decode its result.
    ///
    /// A `SESSION_EXPIRED` error drops the connection back to
    /// [`AuthState::Unauthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] on any failure.
    pub async fn execute<C: VaultCommand>(
        &self,
        command: &C,
        options: RequestOptions,
    ) -> Result<C::Response> {
        let outcome = self.rpc.call_as(C::METHOD, command, options).await;

        if matches!(&outcome, Err(e) if e.code() == Some(&ErrorCode::SessionExpired)) {
            debug!("Session expired");
            *self.state.write() = AuthState::Unauthenticated;
        }

        Ok(outcome?)
    }

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a transport error if shutting down the stream fails.
    pub async fn close(&self) -> Result<()> {
        self.rpc.close().await?;
        *self.state.write() = AuthState::Unauthenticated;
        Ok(())
    }
}

/// Tracks handshake progress, leaving the state `Rejected` unless the
/// handshake completes.
struct HandshakeGuard<'a> {
    state: &'a RwLock<AuthState>,
    completed: bool,
}

impl<'a> HandshakeGuard<'a> {
    fn start(state: &'a RwLock<AuthState>) -> Self {
        *state.write() = AuthState::ChallengeRequested;
        Self {
            state,
            completed: false,
        }
    }

    fn advance(&self, next: AuthState) {
        *self.state.write() = next;
    }

    fn complete(mut self, session: Session) {
        *self.state.write() = AuthState::Authenticated(session);
        self.completed = true;
    }
}

impl Drop for HandshakeGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            *self.state.write() = AuthState::Rejected;
        }
    }
}
