//! Drive identification and layout.
//!
//! A vault drive carries a hidden `.ursafe/` directory with the encrypted
//! payload, metadata, detached manifest signature, audit log, and the
//! drive-resident share chunks. Drive *enumeration* is an external
//! collaborator; this module only judges paths it is handed.

use std::fs;
use std::path::{Path, PathBuf};

use ursafe_common::{Error, Result};
use ursafe_crypto::{Salt, SALT_LENGTH};

/// Hidden vault directory at the drive root.
pub const URSAFE_DIRNAME: &str = ".ursafe";
/// Encrypted secrets payload.
pub const VAULT_FILENAME: &str = "vault.enc";
/// Encrypted metadata with plaintext salt header.
pub const METADATA_FILENAME: &str = "metadata.enc";
/// Detached Ed25519 manifest signature.
pub const MANIFEST_FILENAME: &str = "manifest.sig";
/// Drive-resident share chunk directory.
pub const CHUNKS_DIRNAME: &str = "chunks";

/// Path helpers for one drive's vault layout.
#[derive(Debug, Clone)]
pub struct DriveLayout {
    root: PathBuf,
}

impl DriveLayout {
    pub fn new(drive_root: impl Into<PathBuf>) -> Self {
        Self {
            root: drive_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ursafe_dir(&self) -> PathBuf {
        self.root.join(URSAFE_DIRNAME)
    }

    pub fn vault_file(&self) -> PathBuf {
        self.ursafe_dir().join(VAULT_FILENAME)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.ursafe_dir().join(METADATA_FILENAME)
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.ursafe_dir().join(MANIFEST_FILENAME)
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.ursafe_dir().join(CHUNKS_DIRNAME)
    }

    /// Whether this path carries a complete vault layout: the `.ursafe`
    /// directory with payload, metadata, manifest, and a non-empty chunk
    /// directory.
    pub fn is_vault_drive(&self) -> bool {
        let has_files = self.vault_file().is_file()
            && self.metadata_file().is_file()
            && self.manifest_file().is_file();
        if !has_files {
            return false;
        }
        match fs::read_dir(self.chunks_dir()) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }

    /// Read the per-drive KDF salt from the metadata file's plaintext
    /// header (the first 16 bytes).
    pub fn drive_salt(&self) -> Result<Salt> {
        let bytes = fs::read(self.metadata_file())?;
        if bytes.len() < SALT_LENGTH {
            return Err(Error::Serialization(
                "metadata file shorter than its salt header".to_string(),
            ));
        }
        let mut salt = [0u8; SALT_LENGTH];
        salt.copy_from_slice(&bytes[..SALT_LENGTH]);
        Ok(Salt::from_bytes(salt))
    }

    /// Remove leftover `.tmp` artifacts from an interrupted save.
    pub fn clean_stale_tmp(&self) -> Result<()> {
        let entries = match fs::read_dir(self.ursafe_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(".tmp")
            {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

/// Free-function form of the layout check, for callers that only hold a path.
pub fn is_vault_drive(path: impl AsRef<Path>) -> bool {
    DriveLayout::new(path.as_ref()).is_vault_drive()
}
