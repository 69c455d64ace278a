//! Credential retrieval, listing and use.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Retrieve a credential and open a lease for `ttl` seconds.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RetrieveRequest {
    /// Vault path of the credential.
    pub path: String,
    /// Requested lease duration in seconds.
    pub ttl: u64,
}

/// A retrieved credential together with its lease.
///
/// The secret is only reachable through [`value`](Self::value) and never
/// shows up in `Debug` output.
#[derive(Clone, Deserialize)]
pub struct Credential {
    path: String,
    value: Value,
    #[serde(default)]
    lease_id: String,
    #[serde(default)]
    ttl: u64,
}

impl Credential {
    /// Vault path of the credential.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The secret material.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the credential, keeping only the secret.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Lease identifier for [`release_lease`](crate::VaultClient::release_lease).
    #[must_use]
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    /// Lease duration granted by the server, which may be shorter than the
    /// one requested.
    #[must_use]
    pub const fn ttl(&self) -> u64 {
        self.ttl
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("path", &self.path)
            .field("value", &"<redacted>")
            .field("lease_id", &self.lease_id)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// List every credential visible to the authenticated agent.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ListRequest {}

/// Non-secret summary of a credential.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CredentialInfo {
    /// Vault path of the credential.
    pub path: String,
    /// Credential type, e.g. `api_key`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Run `operation` against the credential at `path` on the server.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UseRequest {
    /// Vault path of the credential.
    pub path: String,
    /// Server-defined operation name, e.g. `sign_payload`.
    pub operation: String,
    /// Operation-specific parameters.
    pub params: Value,
}

/// Outcome of a use-not-retrieve operation.
///
/// Carries only what the operation derived from the secret, never the secret
/// itself.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UseResult {
    /// Whether the operation succeeded. Absent means it did not.
    #[serde(default)]
    pub success: bool,
    /// Operation-defined output.
    #[serde(default)]
    pub output: Value,
}
