//! Private group descriptors.

use sha2::{Digest, Sha256};

use super::error::{Result, WireError};
use super::limits::{GROUP_SALT_LENGTH, MAX_GROUP_NAME_LENGTH};
use crate::identity::{signed_data, Author};
use crate::ids::GroupId;

const PRIVATE_GROUP_ID_LABEL: &str = "covey.private-group/ID";

/// A private group as described by its creator.
///
/// The id is a hash over the creator, name and salt, so an invitation can
/// carry the descriptor and the receiver recomputes the id instead of
/// trusting one supplied on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateGroup {
    id: GroupId,
    name: String,
    creator: Author,
    salt: [u8; GROUP_SALT_LENGTH],
}

impl PrivateGroup {
    /// Builds a descriptor and derives its id.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Length`] if the name is empty or too long.
    pub fn new(name: impl Into<String>, creator: Author, salt: [u8; GROUP_SALT_LENGTH]) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_GROUP_NAME_LENGTH {
            return Err(WireError::Length(format!(
                "group name length {} not in 1..={MAX_GROUP_NAME_LENGTH}",
                name.len()
            )));
        }
        let id = derive_id(&creator, &name, &salt);
        Ok(Self {
            id,
            name,
            creator,
            salt,
        })
    }

    /// Creates a new group with a random salt.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Length`] if the name is empty or too long.
    pub fn generate(name: impl Into<String>, creator: Author) -> Result<Self> {
        Self::new(name, creator, rand::random())
    }

    #[must_use]
    pub const fn id(&self) -> &GroupId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn creator(&self) -> &Author {
        &self.creator
    }

    #[must_use]
    pub const fn salt(&self) -> &[u8; GROUP_SALT_LENGTH] {
        &self.salt
    }
}

impl std::fmt::Debug for PrivateGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateGroup")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("creator", self.creator.id())
            .finish_non_exhaustive()
    }
}

fn derive_id(creator: &Author, name: &str, salt: &[u8; GROUP_SALT_LENGTH]) -> GroupId {
    let mut hasher = Sha256::new();
    hasher.update(signed_data(PRIVATE_GROUP_ID_LABEL, &[]));
    hasher.update(creator.id().as_bytes());
    hasher.update(u32::try_from(name.len()).unwrap_or(u32::MAX).to_be_bytes());
    hasher.update(name.as_bytes());
    hasher.update(salt);
    GroupId::from_bytes(hasher.finalize().into())
}
