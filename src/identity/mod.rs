//! Author identities and signatures.
//!
//! An [`Author`] is the public half of a pseudonymous identity: a display
//! name plus an Ed25519 public key. A [`LocalAuthor`] additionally holds the
//! secret key and signs on behalf of the local user.
//!
//! # Key Separation
//!
//! Every signature is made over a domain-separation label followed by the
//! payload, so a signature produced for one purpose (for example a group
//! invitation) can never be replayed as a signature for another.

mod author;
mod keypair;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use author::{Author, AUTHOR_FORMAT_VERSION};
pub use keypair::LocalAuthor;

use crate::ids::{AuthorId, GroupId};

/// Label for deriving the pairwise contact group id.
const CONTACT_GROUP_LABEL: &str = "covey.contact-group/ID";

/// Errors from identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key bytes did not form a valid key.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Signature bytes were malformed or did not verify.
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// Author fields violated a bound.
    #[error("Invalid author: {0}")]
    InvalidAuthor(String),
}

/// Builds the byte string that is actually signed: a length-prefixed label
/// followed by the payload.
pub(crate) fn signed_data(label: &str, payload: &[u8]) -> Vec<u8> {
    let label = label.as_bytes();
    let mut data = Vec::with_capacity(4 + label.len() + payload.len());
    data.extend_from_slice(&u32::try_from(label.len()).unwrap_or(u32::MAX).to_be_bytes());
    data.extend_from_slice(label);
    data.extend_from_slice(payload);
    data
}

/// Derives the id of the pairwise group shared by two authors.
///
/// The result does not depend on argument order, so both sides of a contact
/// relationship compute the same id.
#[must_use]
pub fn contact_group_id(a: &AuthorId, b: &AuthorId) -> GroupId {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(signed_data(CONTACT_GROUP_LABEL, &[]));
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    GroupId::from_bytes(hasher.finalize().into())
}
