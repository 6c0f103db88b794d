//! Share file stores.
//!
//! Shares live as hidden files in two directories: a host store at an
//! OS-specific system path and a drive store under the vault's `.ursafe/chunks/`
//! directory. Master-key shares are named `.c_<index>`, signing-key shares
//! `.s_<index>`; file contents are the raw share bytes with no header.
//!
//! The host directory is shared by every vault on the machine, so two vaults
//! on one host will collide on filenames. Callers that need several vaults
//! point each engine at its own directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ursafe_common::{Error, Result};

/// Which of the two parallel share sets a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    /// Shares of the vault master key (`.c_<index>`).
    MasterKey,
    /// Shares of the Ed25519 signing-key seed (`.s_<index>`).
    SigningKey,
}

impl ShareKind {
    fn prefix(self) -> &'static str {
        match self {
            ShareKind::MasterKey => ".c_",
            ShareKind::SigningKey => ".s_",
        }
    }
}

/// A directory holding share files.
#[derive(Debug, Clone)]
pub struct ShareStore {
    dir: PathBuf,
}

impl ShareStore {
    /// Open a store over an arbitrary directory (created lazily by `put`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The default host store location for this OS.
    #[cfg(windows)]
    pub fn default_host_dir() -> PathBuf {
        let program_data =
            std::env::var_os("ProgramData").unwrap_or_else(|| "C:\\ProgramData".into());
        Path::new(&program_data).join(".ursafe_chunks")
    }

    /// The default host store location for this OS.
    #[cfg(not(windows))]
    pub fn default_host_dir() -> PathBuf {
        PathBuf::from("/var/lib/.ursafe_chunks")
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn share_path(&self, kind: ShareKind, index: u8) -> PathBuf {
        self.dir.join(format!("{}{}", kind.prefix(), index))
    }

    /// Write one share, creating the store directory on first use.
    ///
    /// The write is atomic (temp file + rename) and on Unix the directory is
    /// restricted to the owning user.
    pub fn put(&self, kind: ShareKind, index: u8, bytes: &[u8]) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidInput("share index cannot be 0".to_string()));
        }

        fs::create_dir_all(&self.dir).map_err(|e| self.map_io(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.dir, perms).map_err(|e| self.map_io(e))?;
        }

        let path = self.share_path(kind, index);
        let tmp = self.dir.join(format!("{}{}.tmp", kind.prefix(), index));

        let mut file = fs::File::create(&tmp).map_err(|e| self.map_io(e))?;
        file.write_all(bytes).map_err(|e| self.map_io(e))?;
        file.sync_all().map_err(|e| self.map_io(e))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| self.map_io(e))?;
        Ok(())
    }

    /// Read one share.
    pub fn get(&self, kind: ShareKind, index: u8) -> Result<Vec<u8>> {
        let path = self.share_path(kind, index);
        match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => Err(Error::ShareCorrupt { index }),
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ShareMissing { index })
            }
            Err(e) => Err(self.map_io(e)),
        }
    }

    /// List every readable share of one kind, keyed by index.
    ///
    /// Empty or unreadable files are treated as absent; reconstruction
    /// decides whether what remains is enough.
    pub fn enumerate(&self, kind: ShareKind) -> Result<BTreeMap<u8, Vec<u8>>> {
        let mut shares = BTreeMap::new();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(shares),
            Err(e) => return Err(self.map_io(e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| self.map_io(e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(index_str) = name.strip_prefix(kind.prefix()) else {
                continue;
            };
            let Ok(index) = index_str.parse::<u8>() else {
                continue;
            };
            if index == 0 {
                continue;
            }
            if let Ok(bytes) = fs::read(entry.path()) {
                if !bytes.is_empty() {
                    shares.insert(index, bytes);
                }
            }
        }

        Ok(shares)
    }

    /// Remove every share file of both kinds. The directory itself is left
    /// in place; it may be shared with other data.
    pub fn remove_all(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.map_io(e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| self.map_io(e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(ShareKind::MasterKey.prefix())
                || name.starts_with(ShareKind::SigningKey.prefix())
            {
                fs::remove_file(entry.path()).map_err(|e| self.map_io(e))?;
            }
        }

        Ok(())
    }

    fn map_io(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            Error::PermissionDenied(self.dir.display().to_string())
        } else {
            Error::Io(e)
        }
    }
}
