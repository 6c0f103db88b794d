//! Engine configuration.
//!
//! Everything the original kept as module globals is an explicit value
//! here: the host chunk directory, the KDF parameters, and the share
//! policy. Defaults reproduce the shipped behavior.

use std::path::PathBuf;

use ursafe_common::{Error, Result};
use ursafe_crypto::KdfParams;
use ursafe_shares::ShareStore;

/// How a split share set is sized and partitioned across the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharePolicy {
    /// Shares required to reconstruct (M).
    pub required: u8,
    /// Total shares generated (N).
    pub total: u8,
    /// Shares written to the host store (H).
    pub host: u8,
    /// Shares written to the drive store (D).
    pub drive: u8,
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self {
            required: 10,
            total: 20,
            host: 15,
            drive: 5,
        }
    }
}

impl SharePolicy {
    /// Check internal consistency: `H + D = N`, `M ≥ 2`, both stores hold
    /// at least one share.
    pub fn validate(&self) -> Result<()> {
        if self.required < 2 {
            return Err(Error::InvalidInput(
                "share threshold must be at least 2".to_string(),
            ));
        }
        if self.required > self.total {
            return Err(Error::InvalidInput(
                "share threshold exceeds total shares".to_string(),
            ));
        }
        if self.host == 0 || self.drive == 0 {
            return Err(Error::InvalidInput(
                "both host and drive must hold at least one share".to_string(),
            ));
        }
        if self.host as u16 + self.drive as u16 != self.total as u16 {
            return Err(Error::InvalidInput(
                "host and drive share counts must sum to the total".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a vault engine instance.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding host-side share chunks.
    pub host_chunk_dir: PathBuf,
    /// KDF parameters for newly initialized vaults. Existing vaults use the
    /// parameters recorded in their metadata.
    pub kdf_params: KdfParams,
    /// Share split sizing.
    pub share_policy: SharePolicy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            host_chunk_dir: ShareStore::default_host_dir(),
            kdf_params: KdfParams::default(),
            share_policy: SharePolicy::default(),
        }
    }
}
