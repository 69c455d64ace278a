//! Request and response envelopes.

use crate::error::{Error, ProtocolError, Result};
use crate::vault_error::VaultError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier correlating a response with its request.
pub type RequestId = u64;

/// A request as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request id, unique per connection.
    pub id: RequestId,
    /// Method name, e.g. `credential.retrieve`.
    pub method: String,
    /// Method-specific parameters.
    pub params: Value,
}

/// A response as it appears on the wire.
///
/// Exactly one of `result` and `error` is expected. The error payload is kept
/// as raw JSON so that a malformed one surfaces as a protocol error rather
/// than a failure to read the envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request this answers.
    pub id: RequestId,
    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Build a successful response.
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build a failed response.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault error cannot be serialized.
    pub fn failure(id: RequestId, error: &VaultError) -> Result<Self> {
        let error = serde_json::to_value(error)
            .map_err(|e| crate::error::CodecError::SerializationFailed(e.to_string()))?;
        Ok(Self {
            id,
            result: None,
            error: Some(error),
        })
    }

    /// Split the response into its outcome.
    ///
    /// An error payload always wins. A response with neither field yields
    /// `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Vault`] for an error payload, or a protocol error if
    /// that payload is not a valid vault error.
    pub fn into_outcome(self) -> Result<Value> {
        match self.error {
            Some(error) => {
                let vault_error: VaultError = serde_json::from_value(error)
                    .map_err(|e| ProtocolError::MalformedError(e.to_string()))?;
                Err(Error::Vault(vault_error))
            }
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault_error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest {
            id: 1,
            method: "credential.list".to_string(),
            params: json!({}),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"id": 1, "method": "credential.list", "params": {}})
        );
    }

    #[test]
    fn test_success_outcome() {
        let response: RpcResponse =
            serde_json::from_value(json!({"id": 1, "result": [{"path": "openai/api_key"}]}))
                .unwrap();
        assert_eq!(
            response.into_outcome().unwrap(),
            json!([{"path": "openai/api_key"}])
        );
    }

    #[test]
    fn test_missing_result_is_null() {
        let response: RpcResponse = serde_json::from_value(json!({"id": 4})).unwrap();
        assert_eq!(response.into_outcome().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_outcome() {
        let response: RpcResponse = serde_json::from_value(json!({
            "id": 2,
            "error": {"code": "CREDENTIAL_NOT_FOUND", "message": "no such path"}
        }))
        .unwrap();

        let err = response.into_outcome().unwrap_err();
        let vault = err.vault_error().unwrap();
        assert_eq!(vault.code, ErrorCode::CredentialNotFound);
        assert_eq!(vault.message, "no such path");
    }

    #[test]
    fn test_malformed_error_payload() {
        let response: RpcResponse =
            serde_json::from_value(json!({"id": 3, "error": "boom"})).unwrap();
        let err = response.into_outcome().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MalformedError(_))
        ));
    }

    #[test]
    fn test_failure_roundtrip() {
        let error = VaultError::new(ErrorCode::RateLimited, "slow down").with_detail("10 req/s");
        let response = RpcResponse::failure(9, &error).unwrap();
        assert!(response.result.is_none());

        let err = response.into_outcome().unwrap_err();
        assert_eq!(err.vault_error(), Some(&error));
    }
}
