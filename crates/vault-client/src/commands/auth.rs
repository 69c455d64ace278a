//! Authentication handshake messages.

use serde::{Deserialize, Serialize};

/// Ask the vault for a challenge bound to an agent identity.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChallengeRequest {
    /// Claimed agent identity.
    pub agent: String,
}

/// Challenge issued by the vault.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChallengeResponse {
    /// Hex-encoded random bytes to sign.
    pub challenge: String,
}

/// Prove possession of the agent's private key.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VerifyRequest {
    /// Agent identity the challenge was issued to.
    pub agent: String,
    /// Hex-encoded Ed25519 signature over the raw challenge bytes.
    pub signature: String,
}

/// Verdict on a signed challenge.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct VerifyResponse {
    /// Whether the signature was accepted.
    #[serde(default)]
    pub authenticated: bool,
    /// Opaque session identifier on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
