//! Secret record model.
//!
//! A vault's plaintext payload is a map from record name to record body.
//! Record names are unique; insertion order carries no meaning, so the map
//! is a `BTreeMap` and serializes deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The decrypted contents of a vault: record name to record body.
pub type SecretsMap = BTreeMap<String, SecretRecord>;

/// A single secret record.
///
/// The `Opaque` variant carries hex-encoded raw bytes so payloads written by
/// newer record kinds survive a round-trip through an older reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretRecord {
    /// A stored credential.
    Password {
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    /// Free-form text.
    Note { text: String },
    /// Structured key-value pairs (API tokens, connection strings, ...).
    KeyValue { entries: BTreeMap<String, String> },
    /// Raw bytes, hex-encoded.
    Opaque { data: String },
}

impl SecretRecord {
    /// Shorthand for a bare password record.
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: password.into(),
            username: None,
            url: None,
            notes: None,
        }
    }

    /// Shorthand for a note record.
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note { text: text.into() }
    }
}
