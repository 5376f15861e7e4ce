//! Public author identity.

use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{signed_data, IdentityError};
use crate::ids::AuthorId;
use crate::wire::limits::{MAX_AUTHOR_NAME_LENGTH, PUBLIC_KEY_LENGTH};

/// Current author format version.
pub const AUTHOR_FORMAT_VERSION: u8 = 1;

const AUTHOR_ID_LABEL: &str = "covey.author/ID";

/// A pseudonymous identity: name and Ed25519 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct Author {
    id: AuthorId,
    format_version: u8,
    name: String,
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl Author {
    /// Creates an author with the current format version.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or too long.
    pub fn new(name: impl Into<String>, public_key: [u8; PUBLIC_KEY_LENGTH]) -> Result<Self, IdentityError> {
        Self::with_format_version(AUTHOR_FORMAT_VERSION, name, public_key)
    }

    /// Creates an author with an explicit format version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is unsupported or the name is out of bounds.
    pub fn with_format_version(
        format_version: u8,
        name: impl Into<String>,
        public_key: [u8; PUBLIC_KEY_LENGTH],
    ) -> Result<Self, IdentityError> {
        let name = name.into();
        if format_version != AUTHOR_FORMAT_VERSION {
            return Err(IdentityError::InvalidAuthor(format!(
                "unsupported format version {format_version}"
            )));
        }
        if name.is_empty() || name.len() > MAX_AUTHOR_NAME_LENGTH {
            return Err(IdentityError::InvalidAuthor(format!(
                "name length {} out of bounds",
                name.len()
            )));
        }
        let id = Self::derive_id(format_version, &name, &public_key);
        Ok(Self {
            id,
            format_version,
            name,
            public_key,
        })
    }

    fn derive_id(format_version: u8, name: &str, public_key: &[u8; PUBLIC_KEY_LENGTH]) -> AuthorId {
        let mut hasher = Sha256::new();
        hasher.update(signed_data(AUTHOR_ID_LABEL, &[format_version]));
        hasher.update(u32::try_from(name.len()).unwrap_or(u32::MAX).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update(public_key);
        AuthorId::from_bytes(hasher.finalize().into())
    }

    /// Returns the derived author id.
    #[must_use]
    pub const fn id(&self) -> &AuthorId {
        &self.id
    }

    /// Returns the author format version.
    #[must_use]
    pub const fn format_version(&self) -> u8 {
        self.format_version
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Ed25519 public key bytes.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    /// Compares author ids in constant time.
    #[must_use]
    pub fn is(&self, other: &AuthorId) -> bool {
        self.id.as_bytes().ct_eq(other.as_bytes()).into()
    }

    /// Verifies a signature made by this author under `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or signature is malformed or the
    /// signature does not verify.
    pub fn verify(&self, label: &str, payload: &[u8], signature: &[u8]) -> Result<(), IdentityError> {
        let key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|e| IdentityError::KeyDerivation(e.to_string()))?;
        let signature =
            Signature::from_slice(signature).map_err(|e| IdentityError::Verification(e.to_string()))?;
        key.verify_strict(&signed_data(label, payload), &signature)
            .map_err(|e| IdentityError::Verification(e.to_string()))
    }
}

impl std::fmt::Debug for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Author")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}
