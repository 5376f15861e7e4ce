//! Error types for group invitation operations.
//!
//! Remote protocol violations are not errors here: a message that breaks
//! the protocol moves its session to the error state and the operation
//! succeeds. Errors are reserved for malformed input, calls that make no
//! sense in the current state and storage failures.

use thiserror::Error;

use crate::identity::IdentityError;
use crate::session::{RecordError, Role};
use crate::wire::WireError;

/// Error type for group invitation operations.
#[derive(Error, Debug)]
pub enum InvitationError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A message failed to decode or validate.
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// A stored session record could not be read.
    #[error("Session record error: {0}")]
    Record(#[from] RecordError),

    /// Identity or key handling failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// A local action was requested in a state where it has no meaning.
    #[error("Protocol state error: {0}")]
    ProtocolState(String),

    /// A local action was requested of a role that never performs it.
    #[error("Operation {operation} is not valid for the {} role", .role.as_str())]
    InvalidRole {
        role: Role,
        operation: &'static str,
    },

    /// No session exists for the given contact and group.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Contact not found.
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Private group not found.
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// A message that cannot open a session arrived with no session.
    #[error("Invalid first message: {0}")]
    InvalidFirstMessage(String),

    /// Invalid data provided.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for group invitation operations.
pub type Result<T> = std::result::Result<T, InvitationError>;
