//! Embedded-library binding to a local Sanctum vault.
//!
//! [`VaultBinding`] is the raw contract of an embedded vault implementation:
//! an opaque handle, fixed numeric [`ResultCode`]s and size-then-fill output
//! buffers. [`LocalVault`] wraps any binding with typed results.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod error;
pub mod result_code;
pub mod vault;

pub use binding::VaultBinding;
pub use error::{Error, Result, check};
pub use result_code::{RawResult, ResultCode};
pub use vault::LocalVault;
