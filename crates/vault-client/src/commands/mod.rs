//! Command definitions for vault RPC.
//!
//! Each request type names its wire method and the shape of the result the
//! server returns for it.

mod auth;
mod credential;
mod lease;

pub use auth::{ChallengeRequest, ChallengeResponse, VerifyRequest, VerifyResponse};
pub use credential::{
    Credential, CredentialInfo, ListRequest, RetrieveRequest, UseRequest, UseResult,
};
pub use lease::{ReleaseAck, ReleaseRequest};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Wire method names consumed by the client.
pub mod methods {
    /// Request an authentication challenge.
    pub const AUTH_CHALLENGE: &str = "auth.challenge";
    /// Submit a signed challenge.
    pub const AUTH_VERIFY: &str = "auth.verify";
    /// Retrieve a credential and open a lease.
    pub const CREDENTIAL_RETRIEVE: &str = "credential.retrieve";
    /// List visible credentials.
    pub const CREDENTIAL_LIST: &str = "credential.list";
    /// Run an operation against a credential server-side.
    pub const CREDENTIAL_USE: &str = "credential.use";
    /// Release a lease early.
    pub const LEASE_RELEASE: &str = "lease.release";
}

/// A request the vault understands.
pub trait VaultCommand: Serialize + Send + Sync {
    /// The result payload for this request.
    type Response: DeserializeOwned;

    /// Wire method name.
    const METHOD: &'static str;
}

impl VaultCommand for ChallengeRequest {
    type Response = ChallengeResponse;

    const METHOD: &'static str = methods::AUTH_CHALLENGE;
}

impl VaultCommand for VerifyRequest {
    type Response = VerifyResponse;

    const METHOD: &'static str = methods::AUTH_VERIFY;
}

impl VaultCommand for RetrieveRequest {
    type Response = Credential;

    const METHOD: &'static str = methods::CREDENTIAL_RETRIEVE;
}

impl VaultCommand for ListRequest {
    type Response = Option<Vec<CredentialInfo>>;

    const METHOD: &'static str = methods::CREDENTIAL_LIST;
}

impl VaultCommand for UseRequest {
    type Response = UseResult;

    const METHOD: &'static str = methods::CREDENTIAL_USE;
}

impl VaultCommand for ReleaseRequest {
    type Response = ReleaseAck;

    const METHOD: &'static str = methods::LEASE_RELEASE;
}
