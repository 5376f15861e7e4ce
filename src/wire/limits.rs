//! Field bounds enforced by the codec.

/// Maximum length in bytes of a private group name.
pub const MAX_GROUP_NAME_LENGTH: usize = 100;

/// Exact length in bytes of a private group salt.
pub const GROUP_SALT_LENGTH: usize = 32;

/// Maximum length in bytes of the optional invitation text.
pub const MAX_GROUP_INVITATION_TEXT_LENGTH: usize = 1000;

/// Maximum length in bytes of an invitation signature.
pub const MAX_SIGNATURE_LENGTH: usize = 64;

/// Maximum length in bytes of an author name.
pub const MAX_AUTHOR_NAME_LENGTH: usize = 50;

/// Exact length in bytes of an Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Shortest auto-delete timer a message may carry, in milliseconds.
pub const MIN_AUTO_DELETE_TIMER_MS: i64 = 60 * 1000;

/// Longest auto-delete timer a message may carry, in milliseconds.
pub const MAX_AUTO_DELETE_TIMER_MS: i64 = 365 * 24 * 60 * 60 * 1000;
