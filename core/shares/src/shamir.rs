//! Shamir secret sharing over GF(2^8).
//!
//! A 32-byte secret is split into `n` shares of which any `m` reconstruct
//! it; fewer than `m` reveal nothing. Shares carry their evaluation index
//! (1..=n) and serialize as the index byte followed by the share body.
//!
//! Interpolation alone will happily produce *some* value from any
//! well-formed set of shares, so reconstruction cross-checks distinct share
//! subsets and rejects sets that disagree instead of returning garbage.

use sharks::{Share as SharksShare, Sharks};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use ursafe_common::{Error, Result};

/// Length of secrets this module splits (master key, signing seed).
pub const SECRET_LENGTH: usize = 32;

/// One output of an M-of-N split.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    index: u8,
    body: Vec<u8>,
}

impl Share {
    /// The evaluation index, 1..=n.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Serialize to the on-disk wire form: index byte followed by the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.body.len());
        bytes.push(self.index);
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Parse a share from its wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::InvalidInput(
                "share must be at least two bytes".to_string(),
            ));
        }
        if bytes[0] == 0 {
            return Err(Error::InvalidInput("share index cannot be 0".to_string()));
        }
        Ok(Self {
            index: bytes[0],
            body: bytes[1..].to_vec(),
        })
    }

    fn to_sharks(&self) -> SharksShare {
        let bytes = self.to_bytes();
        SharksShare::try_from(bytes.as_slice()).expect("share wire form is valid")
    }

    fn from_sharks(share: &SharksShare) -> Self {
        let bytes: Vec<u8> = share.into();
        Self {
            index: bytes[0],
            body: bytes[1..].to_vec(),
        }
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share(index={}, [REDACTED])", self.index)
    }
}

/// Split a 32-byte secret into `total` shares, any `required` of which
/// reconstruct it.
///
/// # Preconditions
/// - `secret` must be exactly [`SECRET_LENGTH`] bytes
/// - `2 <= required <= total`
pub fn split(secret: &[u8], required: u8, total: u8) -> Result<Vec<Share>> {
    if secret.len() != SECRET_LENGTH {
        return Err(Error::InvalidInput(format!(
            "secret must be {} bytes, got {}",
            SECRET_LENGTH,
            secret.len()
        )));
    }
    if required < 2 {
        return Err(Error::InvalidInput(
            "reconstruction threshold must be at least 2".to_string(),
        ));
    }
    if total < required {
        return Err(Error::InvalidInput(format!(
            "total shares ({}) below threshold ({})",
            total, required
        )));
    }

    let dealer = Sharks(required);
    let shares: Vec<Share> = dealer
        .dealer(secret)
        .take(total as usize)
        .map(|s| Share::from_sharks(&s))
        .collect();

    debug_assert_eq!(shares.len(), total as usize);
    Ok(shares)
}

/// Reconstruct a secret from at least `required` shares with distinct
/// indices.
///
/// # Errors
/// - `InsufficientShares` when fewer than `required` distinct-index shares
///   are available; no information about the secret is produced
/// - `InconsistentShares` when the shares are well-formed but do not lie on
///   one polynomial (a tampered or mixed share set)
pub fn combine(shares: &[Share], required: u8) -> Result<Zeroizing<Vec<u8>>> {
    let mut distinct: Vec<&Share> = Vec::with_capacity(shares.len());
    for share in shares {
        if !distinct.iter().any(|s| s.index == share.index) {
            distinct.push(share);
        }
    }

    if distinct.len() < required as usize {
        return Err(Error::InsufficientShares {
            available: distinct.len(),
            required: required as usize,
        });
    }

    let body_len = distinct[0].body.len();
    if body_len == 0 || distinct.iter().any(|s| s.body.len() != body_len) {
        return Err(Error::InconsistentShares);
    }

    let sharks = Sharks(required);
    let all: Vec<SharksShare> = distinct.iter().map(|s| s.to_sharks()).collect();

    let secret = Zeroizing::new(
        sharks
            .recover(all.iter())
            .map_err(|_| Error::InconsistentShares)?,
    );

    // Redundant shares let us detect tampering: every window of `required`
    // shares must reconstruct the same secret.
    if distinct.len() > required as usize {
        let head = Zeroizing::new(
            sharks
                .recover(all[..required as usize].iter())
                .map_err(|_| Error::InconsistentShares)?,
        );
        let tail = Zeroizing::new(
            sharks
                .recover(all[all.len() - required as usize..].iter())
                .map_err(|_| Error::InconsistentShares)?,
        );
        if *head != *secret || *tail != *secret {
            return Err(Error::InconsistentShares);
        }
    }

    Ok(secret)
}
