//! Typed wrapper over a [`VaultBinding`].

use crate::binding::VaultBinding;
use crate::error::{Error, Result, check};
use crate::result_code::{RawResult, ResultCode};

use std::path::Path;
use tracing::{debug, instrument, warn};

/// Number of size-then-fill rounds before giving up on output that keeps
/// growing between calls.
const SIZE_ATTEMPTS: usize = 3;

/// An open local vault.
///
/// Closing drops the underlying handle; afterwards every operation fails with
/// [`Error::Closed`].
#[derive(Debug)]
pub struct LocalVault<B: VaultBinding> {
    handle: Option<B>,
}

impl<B: VaultBinding> LocalVault<B> {
    /// Create a new vault at `path` protected by `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitFailed`] carrying the binding's last error
    /// message.
    #[instrument(skip(path, passphrase), fields(path = %path.as_ref().display()))]
    pub fn init(path: impl AsRef<Path>, passphrase: &[u8]) -> Result<Self> {
        match B::init(path.as_ref(), passphrase) {
            Some(handle) => {
                debug!("Vault initialized");
                Ok(Self::from_handle(handle))
            }
            None => {
                let message = B::last_error_message();
                warn!(?message, "Vault init failed");
                Err(Error::InitFailed { message })
            }
        }
    }

    /// Unlock the existing vault at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`] carrying the binding's last error
    /// message.
    #[instrument(skip(path, passphrase), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, passphrase: &[u8]) -> Result<Self> {
        match B::open(path.as_ref(), passphrase) {
            Some(handle) => {
                debug!("Vault opened");
                Ok(Self::from_handle(handle))
            }
            None => {
                let message = B::last_error_message();
                warn!(?message, "Vault open failed");
                Err(Error::OpenFailed { message })
            }
        }
    }

    /// Wrap an already-open handle.
    #[must_use]
    pub const fn from_handle(handle: B) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Release the handle. Idempotent.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("Vault closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Store a secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] on a closed vault, or the binding's
    /// failure code (e.g. `JSON_ERROR` for an unparseable policy).
    pub fn store(&self, name: &str, secret: &[u8], agent: &str, policy: Option<&str>) -> Result<()> {
        check(self.handle()?.store(name, secret, agent, policy))
    }

    /// Read a secret on behalf of `agent`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `ACCESS_DENIED` codes from the binding, or
    /// [`Error::Closed`].
    pub fn retrieve(&self, name: &str, agent: &str) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        read_sized(|out, out_len| handle.retrieve(name, agent, out, out_len))
    }

    /// Check whether `agent` may read `name`.
    ///
    /// # Errors
    ///
    /// Returns `ACCESS_DENIED` when the policy forbids access.
    pub fn check_policy(&self, name: &str, agent: &str) -> Result<()> {
        check(self.handle()?.check_policy(name, agent))
    }

    /// Audit log as a JSON array, optionally for one agent only.
    ///
    /// An empty log is returned as `[]`.
    ///
    /// # Errors
    ///
    /// Returns the binding's failure code or [`Error::Closed`].
    pub fn audit_log(&self, agent_filter: Option<&str>) -> Result<String> {
        let handle = self.handle()?;
        read_json(|out, out_len| handle.audit_log(agent_filter, out, out_len))
    }

    /// Remove a credential.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if nothing is stored under `name`.
    pub fn delete(&self, name: &str) -> Result<()> {
        check(self.handle()?.delete(name))
    }

    /// Credential names as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns the binding's failure code or [`Error::Closed`].
    pub fn list(&self) -> Result<String> {
        let handle = self.handle()?;
        read_json(|out, out_len| handle.list(out, out_len))
    }

    fn handle(&self) -> Result<&B> {
        self.handle.as_ref().ok_or(Error::Closed)
    }
}

/// Drive a size-then-fill call: ask for the length, allocate, then fill.
fn read_sized<F>(mut call: F) -> Result<Vec<u8>>
where
    F: FnMut(Option<&mut [u8]>, &mut usize) -> RawResult,
{
    let mut needed = 0;
    let raw = call(None, &mut needed);
    if raw != ResultCode::BufferTooSmall.as_raw() {
        check(raw)?;
    }

    for _ in 0..SIZE_ATTEMPTS {
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; needed];
        let mut written = 0;
        let raw = call(Some(&mut buf), &mut written);

        if raw == ResultCode::BufferTooSmall.as_raw() {
            // Output grew between the two calls
            needed = written;
            continue;
        }
        check(raw)?;

        buf.truncate(written);
        return Ok(buf);
    }

    Err(Error::Code(ResultCode::BufferTooSmall))
}

fn read_json<F>(call: F) -> Result<String>
where
    F: FnMut(Option<&mut [u8]>, &mut usize) -> RawResult,
{
    let bytes = read_sized(call)?;
    if bytes.is_empty() {
        return Ok("[]".to_string());
    }
    Ok(String::from_utf8(bytes)?)
}
