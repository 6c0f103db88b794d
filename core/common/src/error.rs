//! Common error types for UR Safe.
//!
//! The first group of variants is the public error contract surfaced by the
//! vault engine; the remainder are component-level kinds that the engine
//! translates before they reach a caller. Error kinds are stable; messages
//! are advisory. No variant ever carries PINs, keys, or share bytes.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for UR Safe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The PIN failed to authenticate the vault metadata.
    #[error("PIN rejected")]
    BadPin,

    /// The host's hardware fingerprint does not match the one the vault is bound to.
    #[error("hardware fingerprint mismatch: vault is bound to a different host")]
    HardwareMismatch,

    /// Fewer shares were recovered than the reconstruction threshold requires.
    #[error("insufficient shares: {available} available, {required} required")]
    InsufficientShares { available: usize, required: usize },

    /// Shares decoded to inconsistent polynomials; the share set has been altered.
    #[error("share set is inconsistent")]
    InconsistentShares,

    /// The vault manifest signature failed to verify.
    #[error("tamper detected: {0}")]
    TamperDetected(String),

    /// The audit log chain failed to parse or verify.
    #[error("audit log corrupt at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    /// The selected path does not carry a vault layout.
    #[error("no vault layout at {}", .0.display())]
    DriveNotVault(PathBuf),

    /// Initialization was requested on a drive that already holds a vault.
    #[error("drive already contains a vault")]
    AlreadyInitialized,

    /// The engine has quarantined this vault after a fatal integrity failure.
    #[error("vault is quarantined in this process; re-select the drive to retry")]
    Quarantined,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic operation failed.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A share file is absent from its store.
    #[error("share {index} missing")]
    ShareMissing { index: u8 },

    /// A share file exists but is empty or unreadable.
    #[error("share file for index {index} is corrupt")]
    ShareCorrupt { index: u8 },

    /// The store directory or a share file could not be accessed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
