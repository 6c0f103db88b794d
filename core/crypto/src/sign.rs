//! Ed25519 signatures for the vault manifest and audit log.
//!
//! Verification is strict: non-canonical signature or key encodings are
//! rejected rather than silently accepted.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use ursafe_common::{Error, Result};

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signing-key seed in bytes.
pub const SIGNING_SEED_LENGTH: usize = 32;

/// Generate a fresh Ed25519 keypair.
pub fn generate_signing_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Rebuild a signing key from its 32-byte seed (e.g. after share
/// reconstruction). The seed is the exact value produced by
/// `SigningKey::to_bytes`.
pub fn signing_key_from_seed(seed: &[u8; SIGNING_SEED_LENGTH]) -> SigningKey {
    SigningKey::from_bytes(seed)
}

/// Parse a public key from raw bytes, rejecting non-canonical encodings.
pub fn verifying_key_from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes)
        .map_err(|_| Error::Crypto("invalid Ed25519 public key".to_string()))
}

/// Sign a message, returning the 64-byte detached signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    key.sign(message).to_bytes()
}

/// Verify a detached signature over a message.
///
/// Returns `false` for wrong-length or non-canonical signatures rather than
/// erroring; a signature either verifies or it does not.
pub fn verify(key: &VerifyingKey, signature: &[u8], message: &[u8]) -> bool {
    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify_strict(message, &signature).is_ok()
}
