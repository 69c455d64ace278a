//! Structured errors reported by the vault and their stable codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable error code carried by every [`VaultError`].
///
/// Codes the client knows about map to dedicated variants; anything else is
/// kept verbatim in [`ErrorCode::Other`] so newer servers stay readable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// `AUTH_FAILED`
    AuthFailed,
    /// `ACCESS_DENIED`
    AccessDenied,
    /// `CREDENTIAL_NOT_FOUND`
    CredentialNotFound,
    /// `VAULT_LOCKED`
    VaultLocked,
    /// `LEASE_EXPIRED`
    LeaseExpired,
    /// `RATE_LIMITED`
    RateLimited,
    /// `SESSION_EXPIRED`
    SessionExpired,
    /// Any code this client does not recognise.
    Other(String),
}

impl ErrorCode {
    /// The wire representation of this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::VaultLocked => "VAULT_LOCKED",
            Self::LeaseExpired => "LEASE_EXPIRED",
            Self::RateLimited => "RATE_LIMITED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Other(code) => code,
        }
    }

    /// Whether this is one of the well-known codes.
    #[must_use]
    pub const fn is_well_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "AUTH_FAILED" => Self::AuthFailed,
            "ACCESS_DENIED" => Self::AccessDenied,
            "CREDENTIAL_NOT_FOUND" => Self::CredentialNotFound,
            "VAULT_LOCKED" => Self::VaultLocked,
            "LEASE_EXPIRED" => Self::LeaseExpired,
            "RATE_LIMITED" => Self::RateLimited,
            "SESSION_EXPIRED" => Self::SessionExpired,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match Self::from(code.as_str()) {
            Self::Other(_) => Self::Other(code),
            known => known,
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload returned by the vault.
///
/// Only [`code`](Self::code) is meant for branching. The remaining fields are
/// diagnostics and are carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Additional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Suggested remedy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Link to documentation about this error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    /// Arbitrary structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl VaultError {
    /// Create an error with only a code and message.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
            suggestion: None,
            docs_url: None,
            context: None,
        }
    }

    /// Attach a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a documentation link.
    #[must_use]
    pub fn with_docs_url(mut self, docs_url: impl Into<String>) -> Self {
        self.docs_url = Some(docs_url.into());
        self
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " — {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VaultError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_codes_map_to_variants() {
        let cases = [
            ("AUTH_FAILED", ErrorCode::AuthFailed),
            ("ACCESS_DENIED", ErrorCode::AccessDenied),
            ("CREDENTIAL_NOT_FOUND", ErrorCode::CredentialNotFound),
            ("VAULT_LOCKED", ErrorCode::VaultLocked),
            ("LEASE_EXPIRED", ErrorCode::LeaseExpired),
            ("RATE_LIMITED", ErrorCode::RateLimited),
            ("SESSION_EXPIRED", ErrorCode::SessionExpired),
        ];

        for (wire, expected) in cases {
            let code = ErrorCode::from(wire);
            assert_eq!(code, expected);
            assert!(code.is_well_known());
            assert_eq!(code.as_str(), wire);
        }
    }

    #[test]
    fn test_unknown_code_is_forwarded() {
        let code = ErrorCode::from("QUOTA_EXCEEDED".to_string());
        assert_eq!(code, ErrorCode::Other("QUOTA_EXCEEDED".to_string()));
        assert!(!code.is_well_known());
        assert_eq!(String::from(code), "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_decode_preserves_diagnostics() {
        let payload = json!({
            "code": "VAULT_LOCKED",
            "message": "Vault is sealed",
            "detail": "Run unseal command first",
            "suggestion": "sanctum unseal",
            "docs_url": "https://docs.example/errors/vault-locked",
            "context": {"sealed_at": 1_700_000_000}
        });

        let err: VaultError = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(err.code, ErrorCode::VaultLocked);
        assert_eq!(err.suggestion.as_deref(), Some("sanctum unseal"));
        assert_eq!(
            err.docs_url.as_deref(),
            Some("https://docs.example/errors/vault-locked")
        );
        assert_eq!(err.context, Some(json!({"sealed_at": 1_700_000_000})));
        assert_eq!(serde_json::to_value(&err).unwrap(), payload);
    }

    #[test]
    fn test_vault_error_format() {
        let err = VaultError::new(ErrorCode::VaultLocked, "Vault is sealed")
            .with_detail("Run unseal command first");
        assert_eq!(
            err.to_string(),
            "[VAULT_LOCKED] Vault is sealed — Run unseal command first"
        );

        let err = VaultError::new("CREDENTIAL_NOT_FOUND", "no such path");
        assert_eq!(err.to_string(), "[CREDENTIAL_NOT_FOUND] no such path");
    }
}
