//! Common types shared across UR Safe crates.
//!
//! Provides the shared error taxonomy and the secret record model used by
//! the vault engine and its callers.

pub mod error;
pub mod records;

pub use error::{Error, Result};
pub use records::{SecretRecord, SecretsMap};
