//! Cryptographic primitives for UR Safe.
//!
//! This crate provides:
//! - Key derivation using Argon2id (with HKDF factor binding)
//! - Authenticated encryption using AES-256-GCM
//! - Ed25519 signatures with strict verification
//! - SHA-256 hashing
//! - Secure key types with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Authentication tags are verified in constant time

pub mod aead;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod sign;

pub use aead::{aead_decrypt, aead_encrypt, SealedBox, NONCE_SIZE, TAG_SIZE};
pub use hash::sha256;
pub use kdf::{bind_vault_key, derive_key, KdfParams};
pub use keys::{MasterKey, Salt, KEY_LENGTH, SALT_LENGTH};
pub use sign::{
    generate_signing_keypair, sign, signing_key_from_seed, verify, verifying_key_from_bytes,
    PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH, SIGNING_SEED_LENGTH,
};

// Callers hold these key types directly.
pub use ed25519_dalek::{SigningKey, VerifyingKey};
