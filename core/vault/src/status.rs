//! Read-only status reports for monitoring surfaces.

use serde::Serialize;
use std::path::PathBuf;

pub use ursafe_logchain::LogStats;

/// Lifecycle state of a vault engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// The drive carries no vault layout.
    Absent,
    /// A vault exists but has not been unlocked by this engine.
    Initialized,
    /// Keys are held in memory; the secrets map is accessible.
    Unlocked,
    /// A previous session was locked; keys are gone.
    Locked,
    /// A fatal integrity fault was detected; unlock is refused until the
    /// drive is re-selected with a fresh engine.
    Quarantined,
}

/// Overall engine/drive status.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    pub drive_path: PathBuf,
    pub state: EngineState,
    pub layout_present: bool,
    /// Stability of the current host's fingerprint, in `[0, 1]`. Values
    /// well below 1.0 mean the hardware binding is weak on this host.
    pub fingerprint_stability: f64,
}

/// Share chunk presence across the two stores.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkStatus {
    pub required: u8,
    pub total: u8,
    pub host_present: Vec<u8>,
    pub drive_present: Vec<u8>,
    /// Whether the union of both stores reaches the reconstruction quorum.
    pub recoverable: bool,
}
