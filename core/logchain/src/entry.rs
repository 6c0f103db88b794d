//! Log entry model and canonical serialization.
//!
//! Hashes and signatures cover the canonical form of an entry's payload
//! fields: sorted-key JSON with no insignificant whitespace. The structs
//! below declare their fields in sorted key order, so plain `serde_json`
//! compact output *is* the canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;

use ursafe_common::{Error, Result};
use ursafe_crypto::{sha256, sign, verify, SigningKey, VerifyingKey};

/// The `prev_hash` value of the first entry in a chain.
pub const GENESIS_HASH: &str = "genesis";

/// The closed set of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    VaultCreated,
    VaultUnlocked,
    VaultLocked,
    SecretAdded,
    SecretUpdated,
    SecretRemoved,
    IntegrityFailure,
    FingerprintMismatch,
}

impl LogAction {
    /// The wire string for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            LogAction::VaultCreated => "vault_created",
            LogAction::VaultUnlocked => "vault_unlocked",
            LogAction::VaultLocked => "vault_locked",
            LogAction::SecretAdded => "secret_added",
            LogAction::SecretUpdated => "secret_updated",
            LogAction::SecretRemoved => "secret_removed",
            LogAction::IntegrityFailure => "integrity_failure",
            LogAction::FingerprintMismatch => "fingerprint_mismatch",
        }
    }

    /// Parse a wire string; unknown actions are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "vault_created" => LogAction::VaultCreated,
            "vault_unlocked" => LogAction::VaultUnlocked,
            "vault_locked" => LogAction::VaultLocked,
            "secret_added" => LogAction::SecretAdded,
            "secret_updated" => LogAction::SecretUpdated,
            "secret_removed" => LogAction::SecretRemoved,
            "integrity_failure" => LogAction::IntegrityFailure,
            "fingerprint_mismatch" => LogAction::FingerprintMismatch,
            _ => return None,
        })
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed/hashed payload of an entry. Field order is key order.
#[derive(Serialize)]
struct Preimage<'a> {
    action: &'a str,
    prev_hash: &'a str,
    timestamp: &'a str,
}

/// One audit log entry, one line of `logchain.json`. Field order is key
/// order, making compact serde output the canonical line form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogEntry {
    pub action: String,
    pub current_hash: String,
    pub prev_hash: String,
    pub signature: String,
    pub timestamp: String,
}

impl LogEntry {
    /// Build and sign a new entry.
    pub fn build(
        action: LogAction,
        prev_hash: &str,
        timestamp: &str,
        signing_key: &SigningKey,
    ) -> Self {
        let preimage = canonical_preimage(action.as_str(), prev_hash, timestamp);
        let current_hash = hex::encode(sha256(preimage.as_bytes()));
        let signature = hex::encode(sign(signing_key, preimage.as_bytes()));

        Self {
            action: action.as_str().to_string(),
            current_hash,
            prev_hash: prev_hash.to_string(),
            signature,
            timestamp: timestamp.to_string(),
        }
    }

    /// Recompute this entry's hash from its payload fields.
    pub fn computed_hash(&self) -> String {
        let preimage = canonical_preimage(&self.action, &self.prev_hash, &self.timestamp);
        hex::encode(sha256(preimage.as_bytes()))
    }

    /// Verify this entry's signature over its canonical payload.
    pub fn signature_valid(&self, public_key: &VerifyingKey) -> bool {
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        let preimage = canonical_preimage(&self.action, &self.prev_hash, &self.timestamp);
        verify(public_key, &signature, preimage.as_bytes())
    }

    /// The entry's action, if it is a known one.
    pub fn parsed_action(&self) -> Option<LogAction> {
        LogAction::parse(&self.action)
    }

    /// Serialize to one canonical log line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn canonical_preimage(action: &str, prev_hash: &str, timestamp: &str) -> String {
    let preimage = Preimage {
        action,
        prev_hash,
        timestamp,
    };
    // Struct serialization cannot fail.
    serde_json::to_string(&preimage).expect("preimage serialization")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ursafe_crypto::generate_signing_keypair;

    #[test]
    fn test_action_wire_strings() {
        for action in [
            LogAction::VaultCreated,
            LogAction::VaultUnlocked,
            LogAction::VaultLocked,
            LogAction::SecretAdded,
            LogAction::SecretUpdated,
            LogAction::SecretRemoved,
            LogAction::IntegrityFailure,
            LogAction::FingerprintMismatch,
        ] {
            assert_eq!(LogAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(LogAction::parse("vault_destroyed"), None);
    }

    #[test]
    fn test_canonical_preimage_is_sorted_and_compact() {
        let preimage = canonical_preimage("vault_created", "genesis", "2026-08-02T10:00:00.000Z");
        assert_eq!(
            preimage,
            r#"{"action":"vault_created","prev_hash":"genesis","timestamp":"2026-08-02T10:00:00.000Z"}"#
        );
    }

    #[test]
    fn test_entry_line_has_sorted_keys() {
        let (sk, _) = generate_signing_keypair();
        let entry = LogEntry::build(
            LogAction::VaultCreated,
            GENESIS_HASH,
            "2026-08-02T10:00:00.000Z",
            &sk,
        );
        let line = entry.to_line().unwrap();

        let action_pos = line.find("\"action\"").unwrap();
        let current_pos = line.find("\"current_hash\"").unwrap();
        let prev_pos = line.find("\"prev_hash\"").unwrap();
        let sig_pos = line.find("\"signature\"").unwrap();
        let ts_pos = line.find("\"timestamp\"").unwrap();
        assert!(action_pos < current_pos);
        assert!(current_pos < prev_pos);
        assert!(prev_pos < sig_pos);
        assert!(sig_pos < ts_pos);
        assert!(!line.contains(": "));
    }

    #[test]
    fn test_hash_and_signature_shapes() {
        let (sk, _) = generate_signing_keypair();
        let entry = LogEntry::build(
            LogAction::VaultUnlocked,
            "ab".repeat(32).as_str(),
            "2026-08-02T10:00:00.000Z",
            &sk,
        );
        assert_eq!(entry.current_hash.len(), 64);
        assert_eq!(entry.signature.len(), 128);
        assert_eq!(entry.computed_hash(), entry.current_hash);
    }

    #[test]
    fn test_signature_verifies_and_rejects_edits() {
        let (sk, pk) = generate_signing_keypair();
        let mut entry = LogEntry::build(
            LogAction::VaultUnlocked,
            GENESIS_HASH,
            "2026-08-02T10:00:00.000Z",
            &sk,
        );
        assert!(entry.signature_valid(&pk));

        entry.action = "vault_locked".to_string();
        assert!(!entry.signature_valid(&pk));
    }

    #[test]
    fn test_line_roundtrip() {
        let (sk, _) = generate_signing_keypair();
        let entry = LogEntry::build(
            LogAction::SecretAdded,
            GENESIS_HASH,
            "2026-08-02T10:00:00.000Z",
            &sk,
        );
        let line = entry.to_line().unwrap();
        let parsed: LogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, entry);
    }
}
