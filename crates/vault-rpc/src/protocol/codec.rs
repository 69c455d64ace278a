//! JSON codec for frame payloads.

use crate::error::{CodecError, ProtocolError, Result};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// Encode a message into JSON bytes.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(msg: &T) -> Result<Bytes> {
    serde_json::to_vec(msg)
        .map(Bytes::from)
        .map_err(|e| CodecError::SerializationFailed(e.to_string()).into())
}

/// Decode JSON bytes into a message.
///
/// A payload that does not parse is a protocol violation by the peer.
///
/// # Errors
///
/// Returns an error if the data is invalid or the message cannot be deserialized.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| ProtocolError::InvalidPayload(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::message::{RpcRequest, RpcResponse};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    #[test]
    fn test_decode_error() {
        let result: Result<RpcResponse> = decode(b"{not json");
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::InvalidPayload(_)))
        ));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 _/.-]{0,24}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_request_roundtrip(id in any::<u64>(), method in "[a-z]{1,10}\\.[a-z]{1,10}", params in arb_json()) {
            let request = RpcRequest { id, method, params };
            let bytes = encode(&request).unwrap();
            let decoded: RpcRequest = decode(&bytes).unwrap();
            prop_assert_eq!(decoded, request);
        }

        #[test]
        fn prop_response_roundtrip(id in any::<u64>(), result in arb_json()) {
            let response = RpcResponse::success(id, result);
            let bytes = encode(&response).unwrap();
            let decoded: RpcResponse = decode(&bytes).unwrap();
            prop_assert_eq!(decoded.id, id);
            prop_assert_eq!(decoded.into_outcome().unwrap(), response.result.unwrap_or(Value::Null));
        }
    }
}
