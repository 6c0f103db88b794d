//! SHA-256 hashing.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes to a 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
