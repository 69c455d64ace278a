//! Raw binding contract for an embedded vault implementation.

use crate::result_code::RawResult;
use std::path::Path;

/// Low-level interface to an embedded vault.
///
/// Mirrors a foreign-function boundary: every operation returns a raw
/// [`RawResult`], and variable-length outputs use a size-then-fill
/// convention. Called with `out = None` (or a buffer shorter than needed),
/// an operation stores the required length in `out_len` and returns
/// `BUFFER_TOO_SMALL`, or `OK` when there is nothing to write. Called with a
/// large enough buffer, it writes the output, stores the number of bytes
/// written in `out_len`, and returns `OK`.
///
/// Handles are released by dropping them.
pub trait VaultBinding: Send + Sized {
    /// Create a new vault at `path`. Returns `None` on failure, with the
    /// reason available from [`last_error_message`](Self::last_error_message).
    fn init(path: &Path, passphrase: &[u8]) -> Option<Self>;

    /// Unlock an existing vault at `path`.
    fn open(path: &Path, passphrase: &[u8]) -> Option<Self>;

    /// Message describing the last failure on the calling thread.
    fn last_error_message() -> Option<String>;

    /// Store `secret` under `name` on behalf of `agent`, with an optional
    /// JSON access policy.
    fn store(&self, name: &str, secret: &[u8], agent: &str, policy: Option<&str>) -> RawResult;

    /// Read the secret stored under `name` if `agent` may access it.
    fn retrieve(
        &self,
        name: &str,
        agent: &str,
        out: Option<&mut [u8]>,
        out_len: &mut usize,
    ) -> RawResult;

    /// Check whether `agent` may access `name` without reading it.
    fn check_policy(&self, name: &str, agent: &str) -> RawResult;

    /// Audit log as a JSON array, optionally restricted to one agent.
    fn audit_log(
        &self,
        agent_filter: Option<&str>,
        out: Option<&mut [u8]>,
        out_len: &mut usize,
    ) -> RawResult;

    /// Remove the credential stored under `name`.
    fn delete(&self, name: &str) -> RawResult;

    /// Credential names as a JSON array.
    fn list(&self, out: Option<&mut [u8]>, out_len: &mut usize) -> RawResult;
}
