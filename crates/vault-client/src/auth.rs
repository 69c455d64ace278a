//! Agent authentication state.

use crate::error::{Error, Result};
use ed25519_dalek::{SECRET_KEY_LENGTH, Signature, Signer, SigningKey};
use std::fmt;

/// Where a connection stands in the challenge-response handshake.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AuthState {
    /// No handshake attempted yet.
    #[default]
    Unauthenticated,
    /// `auth.challenge` sent, waiting for the challenge.
    ChallengeRequested,
    /// Challenge signed, `auth.verify` in flight.
    ChallengeSigned,
    /// The vault accepted the signature.
    Authenticated(Session),
    /// The handshake failed. A new `authenticate` restarts it.
    Rejected,
}

impl AuthState {
    /// Whether the vault accepted this connection.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::ChallengeRequested => write!(f, "challenge requested"),
            Self::ChallengeSigned => write!(f, "challenge signed"),
            Self::Authenticated(session) => write!(f, "authenticated as {}", session.agent),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// An authenticated agent session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// Agent identity the vault accepted.
    pub agent: String,
    /// Session identifier, when the vault issues one.
    pub session_id: Option<String>,
}

/// Sign the raw bytes behind a hex-encoded challenge.
///
/// The returned signature is over the decoded bytes, not the hex text.
pub fn sign_challenge(signing_key: &SigningKey, challenge: &str) -> Result<Signature> {
    let bytes = hex::decode(challenge).map_err(Error::InvalidChallenge)?;
    Ok(signing_key.sign(&bytes))
}

/// Parse a hex-encoded Ed25519 signing key.
///
/// Accepts either a 32-byte secret seed or a 64-byte keypair (seed followed
/// by public key), the latter being checked for consistency.
pub fn signing_key_from_hex(encoded: &str) -> Result<SigningKey> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;

    match bytes.len() {
        SECRET_KEY_LENGTH => {
            let mut seed = [0u8; SECRET_KEY_LENGTH];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair).map_err(|e| Error::InvalidKey(e.to_string()))
        }
        n => Err(Error::InvalidKey(format!(
            "expected 32 or 64 bytes, got {n}"
        ))),
    }
}
