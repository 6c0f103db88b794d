//! On-disk binary formats.
//!
//! - `vault.enc`:    `[12-byte nonce][16-byte tag][ciphertext]`
//! - `metadata.enc`: `[16-byte salt][12-byte nonce][16-byte tag][ciphertext]`
//! - `manifest.sig`: `[64-byte Ed25519 signature]` over
//!   `vault.enc bytes ‖ metadata.enc bytes ‖ log head hash`
//!
//! The salt header is the only plaintext on the drive; everything after it
//! is AEAD-protected.

use serde::{Deserialize, Serialize};

use ursafe_common::{Error, Result};
use ursafe_crypto::{
    aead_decrypt, aead_encrypt, KdfParams, Salt, SealedBox, NONCE_SIZE, SALT_LENGTH, TAG_SIZE,
};

/// Length of the truncated fingerprint check value stored in metadata.
pub const FINGERPRINT_CHECK_LENGTH: usize = 16;

/// Encode a sealed box in payload framing: `[nonce][tag][ciphertext]`.
pub fn encode_payload(sealed: &SealedBox) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + sealed.ciphertext.len());
    bytes.extend_from_slice(&sealed.nonce);
    bytes.extend_from_slice(&sealed.tag);
    bytes.extend_from_slice(&sealed.ciphertext);
    bytes
}

/// Decode payload framing back into a sealed box.
pub fn decode_payload(bytes: &[u8]) -> Result<SealedBox> {
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Serialization(
            "payload shorter than nonce and tag".to_string(),
        ));
    }
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&bytes[NONCE_SIZE..NONCE_SIZE + TAG_SIZE]);
    Ok(SealedBox {
        nonce,
        tag,
        ciphertext: bytes[NONCE_SIZE + TAG_SIZE..].to_vec(),
    })
}

/// Integrity-critical vault parameters, stored AEAD-encrypted on the drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    /// Per-drive KDF salt (also mirrored in the plaintext header).
    pub drive_salt: Salt,
    /// KDF parameters in force for this vault; authoritative on read.
    pub kdf_params: KdfParams,
    /// First 16 bytes of SHA-256 over the bound hardware fingerprint.
    pub fingerprint_check: [u8; FINGERPRINT_CHECK_LENGTH],
    /// The vault's long-term Ed25519 public key.
    pub signing_public_key: [u8; 32],
    /// Share indices resident on the drive (not assumed contiguous).
    pub drive_share_indices: Vec<u8>,
    /// Chain head hash the manifest was signed against.
    pub log_head: String,
}

impl VaultMetadata {
    /// Encrypt and frame: `[salt][nonce][tag][ciphertext]`. The salt header
    /// duplicates `drive_salt` so readers can derive the metadata key before
    /// decrypting anything.
    pub fn seal(&self, key: &[u8; 32]) -> Result<Vec<u8>> {
        let plaintext =
            serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))?;
        let sealed = aead_encrypt(&plaintext, key)?;

        let mut bytes = Vec::with_capacity(SALT_LENGTH + NONCE_SIZE + TAG_SIZE + sealed.ciphertext.len());
        bytes.extend_from_slice(self.drive_salt.as_bytes());
        bytes.extend_from_slice(&encode_payload(&sealed));
        Ok(bytes)
    }

    /// Split a framed metadata file into its salt header and sealed body.
    pub fn split_frame(bytes: &[u8]) -> Result<(Salt, SealedBox)> {
        if bytes.len() < SALT_LENGTH + NONCE_SIZE + TAG_SIZE {
            return Err(Error::Serialization(
                "metadata file shorter than its headers".to_string(),
            ));
        }
        let mut salt = [0u8; SALT_LENGTH];
        salt.copy_from_slice(&bytes[..SALT_LENGTH]);
        let sealed = decode_payload(&bytes[SALT_LENGTH..])?;
        Ok((Salt::from_bytes(salt), sealed))
    }

    /// Decrypt a sealed metadata body.
    pub fn open(sealed: &SealedBox, key: &[u8; 32]) -> Result<Self> {
        let plaintext = aead_decrypt(sealed, key)?;
        serde_json::from_slice(&plaintext).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// The byte string the manifest signs: both artifact files plus the log
/// head the metadata records.
pub fn manifest_input(vault_bytes: &[u8], metadata_bytes: &[u8], log_head: &str) -> Vec<u8> {
    let mut input =
        Vec::with_capacity(vault_bytes.len() + metadata_bytes.len() + log_head.len());
    input.extend_from_slice(vault_bytes);
    input.extend_from_slice(metadata_bytes);
    input.extend_from_slice(log_head.as_bytes());
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use ursafe_crypto::aead_encrypt;

    fn sample_metadata() -> VaultMetadata {
        VaultMetadata {
            drive_salt: Salt::from_bytes([9u8; SALT_LENGTH]),
            kdf_params: KdfParams::default(),
            fingerprint_check: [3u8; FINGERPRINT_CHECK_LENGTH],
            signing_public_key: [5u8; 32],
            drive_share_indices: vec![16, 17, 18, 19, 20],
            log_head: "genesis".to_string(),
        }
    }

    #[test]
    fn test_payload_framing_roundtrip() {
        let key = [1u8; 32];
        let sealed = aead_encrypt(b"payload", &key).unwrap();

        let bytes = encode_payload(&sealed);
        assert_eq!(bytes.len(), NONCE_SIZE + TAG_SIZE + sealed.ciphertext.len());

        let decoded = decode_payload(&bytes).unwrap();
        assert_eq!(decoded, sealed);
    }

    #[test]
    fn test_payload_too_short() {
        assert!(decode_payload(&[0u8; 27]).is_err());
    }

    #[test]
    fn test_metadata_seal_open_roundtrip() {
        let key = [2u8; 32];
        let metadata = sample_metadata();

        let bytes = metadata.seal(&key).unwrap();
        // Salt header is plaintext at offset zero.
        assert_eq!(&bytes[..SALT_LENGTH], metadata.drive_salt.as_bytes());

        let (salt, sealed) = VaultMetadata::split_frame(&bytes).unwrap();
        assert_eq!(salt, metadata.drive_salt);
        assert_eq!(VaultMetadata::open(&sealed, &key).unwrap(), metadata);
    }

    #[test]
    fn test_metadata_open_with_wrong_key_fails() {
        let metadata = sample_metadata();
        let bytes = metadata.seal(&[2u8; 32]).unwrap();
        let (_, sealed) = VaultMetadata::split_frame(&bytes).unwrap();
        assert!(VaultMetadata::open(&sealed, &[3u8; 32]).is_err());
    }

    #[test]
    fn test_metadata_body_is_not_plaintext() {
        let metadata = sample_metadata();
        let bytes = metadata.seal(&[2u8; 32]).unwrap();
        let body = &bytes[SALT_LENGTH..];
        assert!(!body
            .windows(b"signing_public_key".len())
            .any(|w| w == b"signing_public_key"));
    }

    #[test]
    fn test_manifest_input_concatenation() {
        let input = manifest_input(b"vault", b"meta", "genesis");
        assert_eq!(input, b"vaultmetagenesis");
    }
}
