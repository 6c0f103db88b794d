//! Secret sharing for UR Safe.
//!
//! Two halves: the Shamir split/combine scheme ([`shamir`]) and the file
//! stores that persist shares on the host and on the drive ([`store`]).
//! Callers enumerate both stores, merge the results, and hand them to
//! [`combine`]; neither half knows about the other.

pub mod shamir;
pub mod store;

pub use shamir::{combine, split, Share, SECRET_LENGTH};
pub use store::{ShareKind, ShareStore};
