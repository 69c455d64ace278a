//! Per-call options.

use std::time::Duration;
use tokio::time::Instant;

/// Options that apply to a single call.
///
/// A deadline bounds the whole call: waiting for the connection, writing the
/// request and reading the response. Without one the client falls back to its
/// configured default timeout, and without that it waits until the server
/// answers or the transport fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    deadline: Option<Instant>,
}

impl RequestOptions {
    /// Options with no deadline.
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Abort the call at `deadline`.
    #[must_use]
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Abort the call once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl From<Duration> for RequestOptions {
    fn from(timeout: Duration) -> Self {
        Self::with_timeout(timeout)
    }
}

impl From<Instant> for RequestOptions {
    fn from(deadline: Instant) -> Self {
        Self::with_deadline(deadline)
    }
}
