//! Numeric result codes returned across the binding boundary.

use std::fmt;

/// Raw result code as returned by a binding call.
pub type RawResult = u32;

/// Closed set of result codes a local vault binding returns.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum ResultCode {
    /// Success.
    Ok = 0,
    /// A required pointer argument was null.
    NullPointer = 1,
    /// A string argument was not valid UTF-8.
    InvalidUtf8 = 2,
    /// The vault handle was never initialized.
    NotInitialized = 3,
    /// Policy forbids the agent from the credential.
    AccessDenied = 4,
    /// No credential with that name.
    NotFound = 5,
    /// Encryption, decryption or key derivation failed.
    CryptoError = 6,
    /// The output buffer is missing or shorter than required.
    BufferTooSmall = 7,
    /// A policy or output document could not be (de)serialized.
    JsonError = 8,
    /// The implementation panicked and the panic was caught.
    Panic = 9,
}

impl ResultCode {
    /// All codes in numeric order.
    pub const ALL: [Self; 10] = [
        Self::Ok,
        Self::NullPointer,
        Self::InvalidUtf8,
        Self::NotInitialized,
        Self::AccessDenied,
        Self::NotFound,
        Self::CryptoError,
        Self::BufferTooSmall,
        Self::JsonError,
        Self::Panic,
    ];

    /// Map a raw code back to a known variant.
    #[must_use]
    pub const fn from_raw(raw: RawResult) -> Option<Self> {
        match raw {
            0 => Some(Self::Ok),
            1 => Some(Self::NullPointer),
            2 => Some(Self::InvalidUtf8),
            3 => Some(Self::NotInitialized),
            4 => Some(Self::AccessDenied),
            5 => Some(Self::NotFound),
            6 => Some(Self::CryptoError),
            7 => Some(Self::BufferTooSmall),
            8 => Some(Self::JsonError),
            9 => Some(Self::Panic),
            _ => None,
        }
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn as_raw(self) -> RawResult {
        self as RawResult
    }

    /// Symbolic name, e.g. `ACCESS_DENIED`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NullPointer => "NULL_POINTER",
            Self::InvalidUtf8 => "INVALID_UTF8",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::CryptoError => "CRYPTO_ERROR",
            Self::BufferTooSmall => "BUFFER_TOO_SMALL",
            Self::JsonError => "JSON_ERROR",
            Self::Panic => "PANIC",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NullPointer => "null pointer",
            Self::InvalidUtf8 => "invalid UTF-8",
            Self::NotInitialized => "vault not initialized",
            Self::AccessDenied => "access denied",
            Self::NotFound => "credential not found",
            Self::CryptoError => "cryptographic error",
            Self::BufferTooSmall => "buffer too small",
            Self::JsonError => "JSON error",
            Self::Panic => "panic caught at binding boundary",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
