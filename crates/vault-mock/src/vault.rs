//! Shared state and request handling of the mock vault.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use sanctum_vault_client::commands::{
    ChallengeRequest, ChallengeResponse, CredentialInfo, ReleaseRequest, RetrieveRequest,
    UseRequest, UseResult, VerifyRequest, VerifyResponse, methods,
};
use sanctum_vault_rpc::{ErrorCode, RequestId, RpcRequest, Value, VaultError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on lease TTLs, in seconds.
pub const DEFAULT_MAX_TTL: u64 = 3600;

/// Length of issued challenges in bytes.
const CHALLENGE_LEN: usize = 32;

/// A credential held by the mock vault.
#[derive(Clone, Debug)]
pub struct MockCredential {
    value: Value,
    credential_type: Option<String>,
    description: Option<String>,
    allowed_agents: Option<HashSet<String>>,
}

impl MockCredential {
    /// A credential any authenticated agent may access.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            credential_type: None,
            description: None,
            allowed_agents: None,
        }
    }

    /// Set the credential type shown in listings.
    #[must_use]
    pub fn with_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = Some(credential_type.into());
        self
    }

    /// Set the description shown in listings.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict access to the given agent. May be called repeatedly.
    #[must_use]
    pub fn allow(mut self, agent: impl Into<String>) -> Self {
        self.allowed_agents
            .get_or_insert_with(HashSet::new)
            .insert(agent.into());
        self
    }

    fn permits(&self, agent: &str) -> bool {
        self.allowed_agents
            .as_ref()
            .is_none_or(|allowed| allowed.contains(agent))
    }

    fn secret_bytes(&self) -> Vec<u8> {
        match &self.value {
            Value::String(s) => s.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        }
    }
}

/// An outstanding lease.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lease {
    /// Credential path the lease covers.
    pub path: String,
    /// Agent holding the lease.
    pub agent: String,
    /// Granted TTL in seconds.
    pub ttl: u64,
}

#[derive(Debug)]
struct State {
    agents: HashMap<String, VerifyingKey>,
    credentials: BTreeMap<String, MockCredential>,
    leases: HashMap<String, Lease>,
    max_ttl: u64,
    locked: bool,
    injected: HashMap<String, VecDeque<VaultError>>,
    response_delay: Option<Duration>,
    wire_log: Vec<(RequestId, String)>,
    session_epoch: u64,
    next_lease: u64,
    next_session: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            agents: HashMap::new(),
            credentials: BTreeMap::new(),
            leases: HashMap::new(),
            max_ttl: DEFAULT_MAX_TTL,
            locked: false,
            injected: HashMap::new(),
            response_delay: None,
            wire_log: Vec::new(),
            session_epoch: 0,
            next_lease: 1,
            next_session: 1,
        }
    }
}

/// Per-connection authentication progress.
#[derive(Debug, Default)]
pub struct ConnectionSession {
    pending: Option<(String, Vec<u8>)>,
    authenticated: Option<(String, u64)>,
}

impl ConnectionSession {
    /// Agent authenticated on this connection, if any.
    #[must_use]
    pub fn agent(&self) -> Option<&str> {
        self.authenticated.as_ref().map(|(agent, _)| agent.as_str())
    }
}

/// In-process vault speaking the Sanctum RPC protocol.
///
/// Cloning yields another handle to the same state, so a test can keep one
/// handle for setup and inspection while a [`MockServer`](crate::MockServer)
/// serves connections with another.
#[derive(Clone, Debug, Default)]
pub struct MockVault {
    state: Arc<Mutex<State>>,
}

impl MockVault {
    /// Create an empty, unlocked vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent and the key it authenticates with.
    pub fn register_agent(&self, agent: impl Into<String>, key: VerifyingKey) {
        self.state.lock().agents.insert(agent.into(), key);
    }

    /// Store a credential under `path`.
    pub fn add_credential(&self, path: impl Into<String>, credential: MockCredential) {
        self.state.lock().credentials.insert(path.into(), credential);
    }

    /// Cap granted lease TTLs at `max_ttl` seconds.
    pub fn set_max_ttl(&self, max_ttl: u64) {
        self.state.lock().max_ttl = max_ttl;
    }

    /// Lock the vault. Credential operations fail with `VAULT_LOCKED`.
    pub fn lock(&self) {
        self.state.lock().locked = true;
    }

    /// Unlock the vault.
    pub fn unlock(&self) {
        self.state.lock().locked = false;
    }

    /// Fail the next call to `method` with `error`. Errors queue in order.
    pub fn inject_error(&self, method: impl Into<String>, error: VaultError) {
        self.state
            .lock()
            .injected
            .entry(method.into())
            .or_default()
            .push_back(error);
    }

    /// Delay every response by `delay`.
    pub fn set_response_delay(&self, delay: Duration) {
        self.state.lock().response_delay = Some(delay);
    }

    /// Invalidate all authenticated sessions. Later calls on those
    /// connections fail with `SESSION_EXPIRED`.
    pub fn expire_sessions(&self) {
        self.state.lock().session_epoch += 1;
    }

    /// Requests received so far, as `(id, method)` in arrival order.
    #[must_use]
    pub fn wire_log(&self) -> Vec<(RequestId, String)> {
        self.state.lock().wire_log.clone()
    }

    /// Look up an outstanding lease.
    #[must_use]
    pub fn lease(&self, lease_id: &str) -> Option<Lease> {
        self.state.lock().leases.get(lease_id).cloned()
    }

    /// Number of outstanding leases.
    #[must_use]
    pub fn active_leases(&self) -> usize {
        self.state.lock().leases.len()
    }

    pub(crate) fn response_delay(&self) -> Option<Duration> {
        self.state.lock().response_delay
    }

    /// Handle one request on behalf of a connection.
    pub fn dispatch(
        &self,
        session: &mut ConnectionSession,
        request: &RpcRequest,
    ) -> Result<Value, VaultError> {
        let mut state = self.state.lock();
        state.wire_log.push((request.id, request.method.clone()));

        if let Some(error) = state
            .injected
            .get_mut(&request.method)
            .and_then(VecDeque::pop_front)
        {
            debug!(method = %request.method, code = %error.code, "Returning injected error");
            return Err(error);
        }

        match request.method.as_str() {
            methods::AUTH_CHALLENGE => state.challenge(session, params(request)?),
            methods::AUTH_VERIFY => state.verify(session, params(request)?),
            methods::CREDENTIAL_RETRIEVE => {
                let agent = state.authorize(session)?;
                state.retrieve(&agent, params(request)?)
            }
            methods::CREDENTIAL_LIST => {
                let agent = state.authorize(session)?;
                Ok(state.list(&agent))
            }
            methods::LEASE_RELEASE => {
                let agent = state.authorize(session)?;
                state.release(&agent, params(request)?)
            }
            methods::CREDENTIAL_USE => {
                let agent = state.authorize(session)?;
                state.use_credential(&agent, params(request)?)
            }
            other => Err(VaultError::new("METHOD_NOT_FOUND", format!("unknown method {other}"))),
        }
    }
}

impl State {
    fn challenge(
        &self,
        session: &mut ConnectionSession,
        request: ChallengeRequest,
    ) -> Result<Value, VaultError> {
        if !self.agents.contains_key(&request.agent) {
            warn!(agent = %request.agent, "Challenge for unknown agent");
            return Err(VaultError::new(ErrorCode::AuthFailed, "unknown agent")
                .with_detail(format!("agent {} is not registered", request.agent)));
        }

        let mut challenge = vec![0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut challenge);
        let encoded = hex::encode(&challenge);
        session.pending = Some((request.agent, challenge));

        to_value(&ChallengeResponse { challenge: encoded })
    }

    fn verify(
        &mut self,
        session: &mut ConnectionSession,
        request: VerifyRequest,
    ) -> Result<Value, VaultError> {
        let Some((agent, challenge)) = session.pending.take() else {
            return Err(VaultError::new(
                ErrorCode::AuthFailed,
                "no outstanding challenge",
            ));
        };
        if agent != request.agent {
            return Err(VaultError::new(
                ErrorCode::AuthFailed,
                "challenge was issued to a different agent",
            ));
        }

        let accepted = self
            .agents
            .get(&agent)
            .is_some_and(|key| signature_valid(key, &challenge, &request.signature));

        if !accepted {
            warn!(agent = %agent, "Signature rejected");
            return to_value(&VerifyResponse::default());
        }

        let session_id = format!("sess-{}", self.next_session);
        self.next_session += 1;
        session.authenticated = Some((agent, self.session_epoch));

        to_value(&VerifyResponse {
            authenticated: true,
            session_id: Some(session_id),
        })
    }

    fn authorize(&self, session: &ConnectionSession) -> Result<String, VaultError> {
        let Some((agent, epoch)) = &session.authenticated else {
            return Err(VaultError::new(ErrorCode::AuthFailed, "not authenticated"));
        };
        if *epoch != self.session_epoch {
            return Err(VaultError::new(ErrorCode::SessionExpired, "session expired")
                .with_suggestion("authenticate again"));
        }
        if self.locked {
            return Err(VaultError::new(ErrorCode::VaultLocked, "vault is locked"));
        }
        Ok(agent.clone())
    }

    fn accessible(&self, agent: &str, path: &str) -> Result<&MockCredential, VaultError> {
        let credential = self.credentials.get(path).ok_or_else(|| {
            VaultError::new(ErrorCode::CredentialNotFound, "credential not found")
                .with_detail(path.to_string())
        })?;

        if !credential.permits(agent) {
            return Err(VaultError::new(ErrorCode::AccessDenied, "access denied")
                .with_detail(format!("agent {agent} may not access {path}"))
                .with_context(json!({"agent": agent, "path": path})));
        }
        Ok(credential)
    }

    fn retrieve(&mut self, agent: &str, request: RetrieveRequest) -> Result<Value, VaultError> {
        let value = self.accessible(agent, &request.path)?.value.clone();
        let ttl = request.ttl.min(self.max_ttl);

        let lease_id = format!("lease-{}", self.next_lease);
        self.next_lease += 1;
        self.leases.insert(
            lease_id.clone(),
            Lease {
                path: request.path.clone(),
                agent: agent.to_string(),
                ttl,
            },
        );
        debug!(%lease_id, ttl, "Lease issued");

        Ok(json!({
            "path": request.path,
            "value": value,
            "lease_id": lease_id,
            "ttl": ttl,
        }))
    }

    fn list(&self, agent: &str) -> Value {
        let visible: Vec<CredentialInfo> = self
            .credentials
            .iter()
            .filter(|(_, credential)| credential.permits(agent))
            .map(|(path, credential)| CredentialInfo {
                path: path.clone(),
                credential_type: credential.credential_type.clone(),
                description: credential.description.clone(),
            })
            .collect();

        json!(visible)
    }

    fn release(&mut self, agent: &str, request: ReleaseRequest) -> Result<Value, VaultError> {
        let owned = self
            .leases
            .get(&request.lease_id)
            .is_some_and(|lease| lease.agent == agent);

        if !owned {
            return Err(VaultError::new(ErrorCode::LeaseExpired, "lease expired")
                .with_detail(request.lease_id));
        }

        self.leases.remove(&request.lease_id);
        debug!(lease_id = %request.lease_id, "Lease released");
        Ok(Value::Null)
    }

    fn use_credential(&self, agent: &str, request: UseRequest) -> Result<Value, VaultError> {
        let secret = self.accessible(agent, &request.path)?.secret_bytes();

        let result = match request.operation.as_str() {
            "sign_payload" => match request.params.get("payload").and_then(Value::as_str) {
                Some(payload) => {
                    let mut hasher = Sha256::new();
                    hasher.update(&secret);
                    hasher.update(payload.as_bytes());
                    UseResult {
                        success: true,
                        output: json!({"signature": hex::encode(hasher.finalize())}),
                    }
                }
                None => UseResult {
                    success: false,
                    output: json!({"error": "missing payload"}),
                },
            },
            "fingerprint" => UseResult {
                success: true,
                output: json!({"fingerprint": hex::encode(Sha256::digest(&secret))}),
            },
            other => {
                return Err(VaultError::new(
                    "UNSUPPORTED_OPERATION",
                    format!("operation {other} is not supported"),
                ));
            }
        };

        to_value(&result)
    }
}

fn signature_valid(key: &VerifyingKey, challenge: &[u8], signature: &str) -> bool {
    let Ok(bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(challenge, &signature).is_ok()
}

fn params<T: DeserializeOwned>(request: &RpcRequest) -> Result<T, VaultError> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        VaultError::new("INVALID_PARAMS", "invalid parameters").with_detail(e.to_string())
    })
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, VaultError> {
    serde_json::to_value(value)
        .map_err(|e| VaultError::new("INTERNAL", "failed to encode result").with_detail(e.to_string()))
}
