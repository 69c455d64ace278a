//! Lease management.

use serde::{Deserialize, Serialize};

/// Release a lease before its TTL runs out.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReleaseRequest {
    /// Lease identifier returned by a retrieve.
    pub lease_id: String,
}

/// Acknowledgement of a release. Whatever the server returns is accepted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReleaseAck;

impl<'de> Deserialize<'de> for ReleaseAck {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}
