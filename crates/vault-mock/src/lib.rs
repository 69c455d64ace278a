//! Mock Sanctum vault for tests and local demos.
//!
//! [`MockVault`] holds agents, credentials and leases in memory and answers
//! the vault RPC methods. [`MockServer`] serves it over a Unix or TCP
//! socket, and [`serve_stream`] over any single byte stream.
//! [`MemoryBinding`] is an in-memory implementation of the local binding
//! contract.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod memory_binding;
mod server;
mod vault;

pub use memory_binding::MemoryBinding;
pub use server::{MockServer, serve_stream};
pub use vault::{ConnectionSession, DEFAULT_MAX_TTL, Lease, MockCredential, MockVault};
