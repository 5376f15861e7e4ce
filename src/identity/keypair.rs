//! The local user's signing identity.
//!
//! # Security
//!
//! - Secret bytes are automatically zeroized on drop via [`ZeroizeOnDrop`]
//! - The signing key is rebuilt for each signature and dropped immediately
//! - Debug output never includes secret material

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::{signed_data, Author, IdentityError};

/// The local author, holding the Ed25519 secret key.
#[derive(ZeroizeOnDrop)]
pub struct LocalAuthor {
    /// The secret key bytes (zeroized on drop).
    secret_bytes: [u8; 32],

    /// Public identity (not sensitive, skip zeroization).
    #[zeroize(skip)]
    author: Author,
}

impl LocalAuthor {
    /// Generates a new random identity with the given display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is out of bounds.
    pub fn generate(name: impl Into<String>) -> Result<Self, IdentityError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let secret_bytes = Zeroizing::new(signing_key.to_bytes());
        Self::from_secret_bytes(name, *secret_bytes)
    }

    /// Restores an identity from stored secret key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is out of bounds.
    pub fn from_secret_bytes(name: impl Into<String>, secret_bytes: [u8; 32]) -> Result<Self, IdentityError> {
        let signing_key = SigningKey::from_bytes(&secret_bytes);
        let author = Author::new(name, signing_key.verifying_key().to_bytes())?;
        Ok(Self {
            secret_bytes,
            author,
        })
    }

    /// Returns the public identity.
    #[must_use]
    pub const fn author(&self) -> &Author {
        &self.author
    }

    /// Signs `payload` under the domain-separation `label`.
    ///
    /// Returns the 64-byte Ed25519 signature.
    #[must_use]
    pub fn sign(&self, label: &str, payload: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret_bytes);
        signing_key
            .sign(&signed_data(label, payload))
            .to_bytes()
            .to_vec()
    }

    /// Returns the raw secret key bytes for storage, wrapped in `Zeroizing`.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret_bytes)
    }
}

impl std::fmt::Debug for LocalAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret key
        f.debug_struct("LocalAuthor")
            .field("author", &self.author)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let local = LocalAuthor::generate("alice").unwrap();
        let sig = local.sign("label", b"payload");
        assert_eq!(sig.len(), 64);
        assert!(local.author().verify("label", b"payload", &sig).is_ok());
    }

    #[test]
    fn verify_rejects_other_label() {
        let local = LocalAuthor::generate("alice").unwrap();
        let sig = local.sign("label-a", b"payload");
        assert!(local.author().verify("label-b", b"payload", &sig).is_err());
    }

    #[test]
    fn verify_rejects_other_author() {
        let alice = LocalAuthor::generate("alice").unwrap();
        let bob = LocalAuthor::generate("bob").unwrap();
        let sig = alice.sign("label", b"payload");
        assert!(bob.author().verify("label", b"payload", &sig).is_err());
    }

    #[test]
    fn restore_from_secret_bytes() {
        let original = LocalAuthor::generate("alice").unwrap();
        let restored = LocalAuthor::from_secret_bytes("alice", *original.secret_bytes()).unwrap();
        assert_eq!(original.author(), restored.author());
    }

    #[test]
    fn debug_omits_secret() {
        let local = LocalAuthor::generate("alice").unwrap();
        let secret_hex = hex::encode(*local.secret_bytes());
        let debug = format!("{local:?}");
        assert!(!debug.contains(&secret_hex));
    }
}
