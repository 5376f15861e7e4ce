//! Fixed-size identifiers used throughout the invitation protocol.
//!
//! Every identifier except [`ContactId`] is a 32-byte SHA-256 digest. They
//! are distinct newtypes so a message id can never be passed where a group id
//! is expected.
//!
//! Identifiers serialize to JSON as lowercase hex and are stored in `SQLite`
//! as raw 32-byte blobs.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of every hash-derived identifier.
pub const ID_LENGTH: usize = 32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            /// Wraps raw identifier bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Parses an identifier from a slice, returning `None` on a length mismatch.
            #[must_use]
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; ID_LENGTH]>::try_from(bytes).ok().map(Self)
            }

            /// Parses an identifier from lowercase or uppercase hex.
            #[must_use]
            pub fn from_hex(s: &str) -> Option<Self> {
                hex::decode(s).ok().and_then(|bytes| Self::from_slice(&bytes))
            }

            /// Returns the raw identifier bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            /// Returns the raw identifier bytes as a slice.
            #[must_use]
            pub const fn as_slice(&self) -> &[u8] {
                &self.0
            }

            /// Returns the identifier as lowercase hex.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex prefix used in log lines.
            #[must_use]
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), self.short())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).ok_or_else(|| {
                    D::Error::custom(concat!("invalid ", stringify!($name), " hex"))
                })
            }
        }
    };
}

define_id!(
    /// Identifier of a group: either a private group or the pairwise
    /// contact group shared with one contact.
    GroupId
);

define_id!(
    /// Identifier of a single stored or transmitted message.
    MessageId
);

define_id!(
    /// Identifier of an author, derived from its name and public key.
    AuthorId
);

define_id!(
    /// Identifier of an invitation session within one contact group.
    ///
    /// Always equal to the bytes of the session's private group id.
    SessionId
);

impl From<GroupId> for SessionId {
    fn from(group_id: GroupId) -> Self {
        Self(group_id.0)
    }
}

impl From<SessionId> for GroupId {
    fn from(session_id: SessionId) -> Self {
        Self(session_id.0)
    }
}

/// Local row identifier of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
