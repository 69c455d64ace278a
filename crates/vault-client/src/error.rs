//! Error types for the vault client.

use sanctum_vault_rpc::{ErrorClass, ErrorCode, VaultError};
use thiserror::Error;

/// Result type for vault client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`VaultClient`](crate::VaultClient).
#[derive(Debug, Error)]
pub enum Error {
    /// Transport, protocol or vault error from the RPC layer.
    #[error(transparent)]
    Rpc(#[from] sanctum_vault_rpc::Error),

    /// The challenge from the server was not valid hex.
    #[error("invalid challenge from server: {0}")]
    InvalidChallenge(#[source] hex::FromHexError),

    /// The server answered the signed challenge with `authenticated: false`.
    #[error("authentication rejected for agent {agent}")]
    AuthenticationRejected {
        /// Agent that attempted to authenticate.
        agent: String,
    },

    /// Signing key material could not be parsed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Class of the underlying failure.
    ///
    /// A rejected handshake is reported as a vault failure, local key and
    /// challenge problems as protocol or client failures.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Rpc(e) => e.class(),
            Self::InvalidChallenge(_) => ErrorClass::Protocol,
            Self::AuthenticationRejected { .. } => ErrorClass::Vault,
            Self::InvalidKey(_) => ErrorClass::Client,
        }
    }

    /// The structured vault error, if the server returned one.
    #[must_use]
    pub const fn vault_error(&self) -> Option<&VaultError> {
        match self {
            Self::Rpc(e) => e.vault_error(),
            _ => None,
        }
    }

    /// The vault error code, if the server returned one.
    #[must_use]
    pub const fn code(&self) -> Option<&ErrorCode> {
        match self.vault_error() {
            Some(e) => Some(&e.code),
            None => None,
        }
    }

    /// Whether the connection itself failed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.class(), ErrorClass::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_passes_through() {
        let err = Error::from(sanctum_vault_rpc::Error::from(VaultError::new(
            "ACCESS_DENIED",
            "denied",
        )));

        assert_eq!(err.class(), ErrorClass::Vault);
        assert_eq!(err.code(), Some(&ErrorCode::AccessDenied));
        assert_eq!(err.to_string(), "[ACCESS_DENIED] denied");
    }

    #[test]
    fn test_invalid_challenge_is_protocol() {
        let err = Error::InvalidChallenge(hex::decode("zz").unwrap_err());
        assert_eq!(err.class(), ErrorClass::Protocol);
        assert!(err.code().is_none());
    }
}
