//! Error types for the local vault binding.

use crate::result_code::{RawResult, ResultCode};
use thiserror::Error;

/// Result type for local vault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from a local vault binding.
#[derive(Debug, Error)]
pub enum Error {
    /// The handle was closed.
    #[error("vault is closed")]
    Closed,

    /// Creating a new vault failed.
    #[error("init failed{}", message_suffix(.message))]
    InitFailed {
        /// Last error message reported by the binding, if any.
        message: Option<String>,
    },

    /// Unlocking an existing vault failed.
    #[error("open failed{}", message_suffix(.message))]
    OpenFailed {
        /// Last error message reported by the binding, if any.
        message: Option<String>,
    },

    /// The binding returned a known failure code.
    #[error("{0}")]
    Code(ResultCode),

    /// The binding returned a code outside the known set.
    #[error("error code {0}")]
    Unknown(RawResult),

    /// The binding produced output that is not UTF-8.
    #[error("binding output is not valid UTF-8: {0}")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// The known result code behind this error, if any.
    #[must_use]
    pub const fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Code(code) => Some(*code),
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Convert a raw binding result into `Ok(())` or the matching error.
///
/// # Errors
///
/// Returns [`Error::Code`] for known failure codes and [`Error::Unknown`]
/// for anything outside the closed set.
pub fn check(raw: RawResult) -> Result<()> {
    match ResultCode::from_raw(raw) {
        Some(ResultCode::Ok) => Ok(()),
        Some(code) => Err(Error::Code(code)),
        None => Err(Error::Unknown(raw)),
    }
}
