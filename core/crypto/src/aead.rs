//! Authenticated encryption using AES-256-GCM.
//!
//! Every encryption uses a fresh random 12-byte nonce and produces a 16-byte
//! authentication tag. Decryption verifies the tag in constant time before
//! any plaintext is released.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::keys::KEY_LENGTH;
use ursafe_common::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// One AEAD encryption result: nonce, tag, and ciphertext kept as separate
/// fields so the on-disk framing can lay them out explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::Crypto("cipher init failed".to_string()))
}

/// Encrypt plaintext under a 32-byte key with a fresh random nonce.
///
/// # Errors
/// - Returns error if the key is not exactly 32 bytes
pub fn aead_encrypt(plaintext: &[u8], key: &[u8]) -> Result<SealedBox> {
    let cipher = cipher(key)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut combined = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Crypto("encryption failed".to_string()))?;

    // aes-gcm appends the tag to the ciphertext; split it back out.
    let tag_offset = combined.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&combined[tag_offset..]);
    combined.truncate(tag_offset);

    Ok(SealedBox {
        nonce,
        tag,
        ciphertext: combined,
    })
}

/// Decrypt a sealed box under a 32-byte key.
///
/// # Errors
/// - Returns error if the key is not exactly 32 bytes
/// - Returns error on any tag mismatch; no plaintext is released
pub fn aead_decrypt(sealed: &SealedBox, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = cipher(key)?;

    let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(&sealed.ciphertext);
    combined.extend_from_slice(&sealed.tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), combined.as_slice())
        .map_err(|_| Error::Crypto("authentication tag mismatch".to_string()))?;

    Ok(Zeroizing::new(plaintext))
}
