//! Key derivation using Argon2id, plus the HKDF step that binds the
//! remaining unlock factors into the vault working key.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. The parameters
//! used at initialization are stored in the vault metadata so future readers
//! reproduce the derivation exactly.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::keys::{MasterKey, KEY_LENGTH};
use ursafe_common::{Error, Result};

/// Domain separation for the vault working key.
const VAULT_KEY_DOMAIN: &[u8] = b"ursafe:vault-key:v1";

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of iterations.
    pub time_cost: u32,
    /// Memory cost in KiB (65536 = 64 MiB).
    pub memory_cost_kib: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_cost_kib: 65536,
            parallelism: 1,
        }
    }
}

/// Derive a 32-byte key from a PIN and salt using Argon2id.
///
/// # Preconditions
/// - `password` must not be empty
/// - `salt` must be at least 8 bytes
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Security
/// - The password is not stored or logged
/// - The output buffer is zeroized on drop
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if password.is_empty() {
        return Err(Error::InvalidInput("PIN cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    argon2
        .hash_password_into(password, salt, key.as_mut())
        .map_err(|e| Error::Crypto(format!("key derivation failed: {}", e)))?;

    Ok(key)
}

/// Bind the reconstructed master key and the hardware fingerprint into the
/// vault working key.
///
/// HKDF-SHA256 with the PIN-derived key as extraction salt and the
/// fingerprint in the info string: every unlock factor participates, so the
/// payload key cannot be reproduced with any factor absent. HKDF (not a
/// second Argon2 pass) because the master key is already high-entropy.
pub fn bind_vault_key(
    kdf_key: &[u8; KEY_LENGTH],
    master_key: &MasterKey,
    fingerprint: &[u8; 32],
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    let mut info = Vec::with_capacity(VAULT_KEY_DOMAIN.len() + fingerprint.len());
    info.extend_from_slice(VAULT_KEY_DOMAIN);
    info.extend_from_slice(fingerprint);

    let hk = Hkdf::<Sha256>::new(Some(kdf_key), master_key.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    hk.expand(&info, key.as_mut())
        .map_err(|_| Error::Crypto("HKDF expand failed".to_string()))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            memory_cost_kib: 1024,
            parallelism: 1,
        }
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [42u8; 16];
        let key1 = derive_key(b"1234", &salt, &fast_params()).unwrap();
        let key2 = derive_key(b"1234", &salt, &fast_params()).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key(b"1234", &[1u8; 16], &fast_params()).unwrap();
        let key2 = derive_key(b"1234", &[2u8; 16], &fast_params()).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_derive_key_different_pin() {
        let salt = [42u8; 16];
        let key1 = derive_key(b"1234", &salt, &fast_params()).unwrap();
        let key2 = derive_key(b"9999", &salt, &fast_params()).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_derive_key_empty_pin_fails() {
        assert!(derive_key(b"", &[0u8; 16], &fast_params()).is_err());
    }

    #[test]
    fn test_derive_key_respects_params() {
        let salt = [42u8; 16];
        let slow = KdfParams {
            time_cost: 2,
            memory_cost_kib: 1024,
            parallelism: 1,
        };
        let key1 = derive_key(b"1234", &salt, &fast_params()).unwrap();
        let key2 = derive_key(b"1234", &salt, &slow).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_bind_vault_key_uses_every_factor() {
        let kdf_key = [1u8; KEY_LENGTH];
        let master = MasterKey::from_bytes([2u8; KEY_LENGTH]);
        let fingerprint = [3u8; 32];

        let base = bind_vault_key(&kdf_key, &master, &fingerprint).unwrap();

        let other_kdf = bind_vault_key(&[9u8; KEY_LENGTH], &master, &fingerprint).unwrap();
        assert_ne!(*base, *other_kdf);

        let other_master =
            bind_vault_key(&kdf_key, &MasterKey::from_bytes([9u8; KEY_LENGTH]), &fingerprint)
                .unwrap();
        assert_ne!(*base, *other_master);

        let other_fp = bind_vault_key(&kdf_key, &master, &[9u8; 32]).unwrap();
        assert_ne!(*base, *other_fp);

        let again = bind_vault_key(&kdf_key, &master, &fingerprint).unwrap();
        assert_eq!(*base, *again);
    }

    #[test]
    fn test_default_params_match_stored_contract() {
        let params = KdfParams::default();
        assert_eq!(params.time_cost, 3);
        assert_eq!(params.memory_cost_kib, 65536);
        assert_eq!(params.parallelism, 1);
    }
}
