//! Append-only log chain persisted as line-delimited JSON.
//!
//! One entry per line, LF endings, never rewritten. Each entry links to its
//! predecessor by hash and is individually signed, so truncation, edits, and
//! reordering are all detectable from the file alone plus the vault's public
//! key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::entry::{LogAction, LogEntry, GENESIS_HASH};
use ursafe_common::{Error, Result};
use ursafe_crypto::{SigningKey, VerifyingKey};

/// Log file name inside the drive's `.ursafe` directory.
pub const LOG_FILENAME: &str = "logchain.json";

/// Why verification stopped at a particular line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    HashMismatch,
    BadSignature,
    NonMonotonicTime,
    Malformed,
}

impl BreakReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakReason::HashMismatch => "hash_mismatch",
            BreakReason::BadSignature => "bad_signature",
            BreakReason::NonMonotonicTime => "non_monotonic_time",
            BreakReason::Malformed => "malformed",
        }
    }
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a full chain verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Valid,
    /// First failing line (1-based) and why.
    BrokenAt { line: usize, reason: BreakReason },
}

/// Summary of a chain for monitoring surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub entries: usize,
    pub head_hash: String,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

/// Handle to one drive's log chain file.
#[derive(Debug, Clone)]
pub struct LogChain {
    path: PathBuf,
}

impl LogChain {
    /// The chain at `<drive>/.ursafe/logchain.json`.
    pub fn at_drive(drive_root: impl AsRef<Path>) -> Self {
        Self {
            path: drive_root.as_ref().join(".ursafe").join(LOG_FILENAME),
        }
    }

    /// A chain at an explicit path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The underlying file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a signed entry with a fresh timestamp. The file is fsynced
    /// before returning.
    pub fn append(&self, action: LogAction, signing_key: &SigningKey) -> Result<LogEntry> {
        self.append_at(action, Utc::now(), signing_key)
    }

    fn append_at(
        &self,
        action: LogAction,
        now: DateTime<Utc>,
        signing_key: &SigningKey,
    ) -> Result<LogEntry> {
        let prev_hash = self.head_hash()?;
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let entry = LogEntry::build(action, &prev_hash, &timestamp, signing_key);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.to_line()?.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        debug!(action = %action, "log entry appended");
        Ok(entry)
    }

    /// The hash of the newest entry, or `"genesis"` for an empty or absent
    /// chain.
    pub fn head_hash(&self) -> Result<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GENESIS_HASH.to_string())
            }
            Err(e) => return Err(e.into()),
        };

        match last_line(&content) {
            None => Ok(GENESIS_HASH.to_string()),
            Some((line_no, line)) => {
                let entry: LogEntry = serde_json::from_str(line).map_err(|e| Error::CorruptLog {
                    line: line_no,
                    reason: e.to_string(),
                })?;
                Ok(entry.current_hash)
            }
        }
    }

    /// Parse the full chain. The first malformed line aborts with
    /// `CorruptLog` naming that line.
    pub fn chain(&self) -> Result<Vec<LogEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(line).map_err(|e| Error::CorruptLog {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Verify the whole chain: linkage, per-entry hashes and signatures, and
    /// timestamp monotonicity. Returns the first failure; `Err` is reserved
    /// for I/O problems.
    pub fn verify(&self, public_key: &VerifyingKey) -> Result<ChainStatus> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ChainStatus::Valid),
            Err(e) => return Err(e.into()),
        };

        let mut expected_prev = GENESIS_HASH.to_string();
        let mut prev_time: Option<DateTime<Utc>> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if line.is_empty() {
                continue;
            }

            let broken = |reason| {
                Ok(ChainStatus::BrokenAt {
                    line: line_no,
                    reason,
                })
            };

            let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
                return broken(BreakReason::Malformed);
            };
            if entry.parsed_action().is_none() {
                return broken(BreakReason::Malformed);
            }
            let Ok(timestamp) = DateTime::parse_from_rfc3339(&entry.timestamp) else {
                return broken(BreakReason::Malformed);
            };
            let timestamp = timestamp.with_timezone(&Utc);

            if entry.computed_hash() != entry.current_hash {
                return broken(BreakReason::HashMismatch);
            }
            if entry.prev_hash != expected_prev {
                return broken(BreakReason::HashMismatch);
            }
            if !entry.signature_valid(public_key) {
                return broken(BreakReason::BadSignature);
            }
            if let Some(prev) = prev_time {
                if timestamp < prev {
                    return broken(BreakReason::NonMonotonicTime);
                }
            }

            expected_prev = entry.current_hash;
            prev_time = Some(timestamp);
        }

        Ok(ChainStatus::Valid)
    }

    /// Aggregate statistics for monitoring.
    pub fn stats(&self) -> Result<LogStats> {
        let entries = self.chain()?;
        Ok(LogStats {
            entries: entries.len(),
            head_hash: entries
                .last()
                .map(|e| e.current_hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string()),
            first_timestamp: entries.first().map(|e| e.timestamp.clone()),
            last_timestamp: entries.last().map(|e| e.timestamp.clone()),
        })
    }
}

fn last_line(content: &str) -> Option<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(idx, line)| (idx + 1, line))
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use ursafe_crypto::generate_signing_keypair;

    fn chain_in(temp: &TempDir) -> LogChain {
        LogChain::from_path(temp.path().join(LOG_FILENAME))
    }

    #[test]
    fn test_empty_chain_head_is_genesis() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        assert_eq!(chain.head_hash().unwrap(), GENESIS_HASH);
        assert!(chain.chain().unwrap().is_empty());
    }

    #[test]
    fn test_first_append_links_to_genesis() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, _) = generate_signing_keypair();

        let entry = chain.append(LogAction::VaultCreated, &sk).unwrap();
        assert_eq!(entry.prev_hash, GENESIS_HASH);
        assert_eq!(chain.head_hash().unwrap(), entry.current_hash);
    }

    #[test]
    fn test_appends_link_and_verify() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        let first = chain.append(LogAction::VaultCreated, &sk).unwrap();
        let second = chain.append(LogAction::VaultUnlocked, &sk).unwrap();
        let third = chain.append(LogAction::SecretAdded, &sk).unwrap();

        assert_eq!(second.prev_hash, first.current_hash);
        assert_eq!(third.prev_hash, second.current_hash);
        assert_eq!(chain.verify(&pk).unwrap(), ChainStatus::Valid);

        let entries = chain.chain().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "vault_created");
    }

    #[test]
    fn test_file_is_line_delimited_json_with_lf() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, _) = generate_signing_keypair();

        chain.append(LogAction::VaultCreated, &sk).unwrap();
        chain.append(LogAction::VaultLocked, &sk).unwrap();

        let raw = fs::read_to_string(chain.path()).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(!raw.contains("\r\n"));
        assert_eq!(raw.lines().count(), 2);
        for line in raw.lines() {
            serde_json::from_str::<LogEntry>(line).unwrap();
        }
    }

    #[test]
    fn test_tampered_line_breaks_at_that_line() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        for action in [
            LogAction::VaultCreated,
            LogAction::VaultUnlocked,
            LogAction::VaultLocked,
        ] {
            chain.append(action, &sk).unwrap();
        }

        // Flip the action of line 2; its hash no longer matches.
        let raw = fs::read_to_string(chain.path()).unwrap();
        let tampered: Vec<String> = raw
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                if idx == 1 {
                    line.replace("vault_unlocked", "vault_created")
                } else {
                    line.to_string()
                }
            })
            .collect();
        fs::write(chain.path(), tampered.join("\n") + "\n").unwrap();

        match chain.verify(&pk).unwrap() {
            ChainStatus::BrokenAt { line, reason } => {
                assert_eq!(line, 2);
                assert_eq!(reason, BreakReason::HashMismatch);
            }
            ChainStatus::Valid => panic!("tampering not detected"),
        }
    }

    #[test]
    fn test_recomputed_hash_edit_caught_by_signature() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();
        let (other_sk, _) = generate_signing_keypair();

        chain.append(LogAction::VaultCreated, &sk).unwrap();

        // Rebuild line 1 entirely under a different key: hashes are
        // consistent, the signature is not ours.
        let entries = chain.chain().unwrap();
        let forged = LogEntry::build(
            LogAction::VaultCreated,
            GENESIS_HASH,
            &entries[0].timestamp,
            &other_sk,
        );
        fs::write(chain.path(), forged.to_line().unwrap() + "\n").unwrap();

        assert_eq!(
            chain.verify(&pk).unwrap(),
            ChainStatus::BrokenAt {
                line: 1,
                reason: BreakReason::BadSignature
            }
        );
    }

    #[test]
    fn test_unknown_action_is_malformed() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        chain.append(LogAction::VaultCreated, &sk).unwrap();
        let raw = fs::read_to_string(chain.path()).unwrap();
        fs::write(chain.path(), raw.replace("vault_created", "vault_burned")).unwrap();

        assert_eq!(
            chain.verify(&pk).unwrap(),
            ChainStatus::BrokenAt {
                line: 1,
                reason: BreakReason::Malformed
            }
        );
    }

    #[test]
    fn test_garbage_line_is_corrupt_for_chain_and_malformed_for_verify() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        chain.append(LogAction::VaultCreated, &sk).unwrap();
        let mut raw = fs::read_to_string(chain.path()).unwrap();
        raw.push_str("not json at all\n");
        fs::write(chain.path(), raw).unwrap();

        match chain.chain() {
            Err(Error::CorruptLog { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected CorruptLog, got {:?}", other.err()),
        }
        assert_eq!(
            chain.verify(&pk).unwrap(),
            ChainStatus::BrokenAt {
                line: 2,
                reason: BreakReason::Malformed
            }
        );
    }

    #[test]
    fn test_non_monotonic_timestamps_detected() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        let later = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 8, 2, 11, 59, 59).unwrap();

        chain.append_at(LogAction::VaultCreated, later, &sk).unwrap();
        chain
            .append_at(LogAction::VaultUnlocked, earlier, &sk)
            .unwrap();

        assert_eq!(
            chain.verify(&pk).unwrap(),
            ChainStatus::BrokenAt {
                line: 2,
                reason: BreakReason::NonMonotonicTime
            }
        );
    }

    #[test]
    fn test_equal_timestamps_are_allowed() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        let now = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap();
        chain.append_at(LogAction::VaultCreated, now, &sk).unwrap();
        chain.append_at(LogAction::VaultUnlocked, now, &sk).unwrap();

        assert_eq!(chain.verify(&pk).unwrap(), ChainStatus::Valid);
    }

    #[test]
    fn test_timestamp_format_millis_utc() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, _) = generate_signing_keypair();

        let entry = chain.append(LogAction::VaultCreated, &sk).unwrap();
        assert!(entry.timestamp.ends_with('Z'));
        // 2026-08-02T12:34:56.789Z
        assert_eq!(entry.timestamp.len(), 24);
        assert_eq!(&entry.timestamp[19..20], ".");
    }

    #[test]
    fn test_every_prefix_of_a_legitimate_chain_is_valid() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, pk) = generate_signing_keypair();

        for action in [
            LogAction::VaultCreated,
            LogAction::VaultUnlocked,
            LogAction::SecretAdded,
            LogAction::VaultLocked,
        ] {
            chain.append(action, &sk).unwrap();
        }

        let raw = fs::read_to_string(chain.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        for prefix_len in 1..=lines.len() {
            let prefix_path = temp.path().join(format!("prefix_{}.json", prefix_len));
            fs::write(&prefix_path, lines[..prefix_len].join("\n") + "\n").unwrap();
            let prefix = LogChain::from_path(&prefix_path);
            assert_eq!(prefix.verify(&pk).unwrap(), ChainStatus::Valid);
        }
    }

    #[test]
    fn test_stats() {
        let temp = TempDir::new().unwrap();
        let chain = chain_in(&temp);
        let (sk, _) = generate_signing_keypair();

        let empty = chain.stats().unwrap();
        assert_eq!(empty.entries, 0);
        assert_eq!(empty.head_hash, GENESIS_HASH);

        chain.append(LogAction::VaultCreated, &sk).unwrap();
        let entry = chain.append(LogAction::VaultUnlocked, &sk).unwrap();

        let stats = chain.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.head_hash, entry.current_hash);
        assert!(stats.first_timestamp.unwrap() <= stats.last_timestamp.unwrap());
    }
}
