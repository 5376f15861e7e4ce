//! Wire format for group invitation messages.
//!
//! Four message kinds travel between two contacts: an invitation from the
//! group creator, and join, leave and abort messages exchanged by either
//! side. Bodies are CBOR arrays with a leading type tag (see [`codec`]).
//!
//! Decoding is strict: a message that fails to parse, violates a field bound
//! or carries a bad invitation signature is rejected before any session sees
//! it.

pub mod codec;
mod error;
mod group;
pub mod limits;
mod message;
mod signing;

pub use codec::{decode, encode_abort, encode_invite, encode_join, encode_leave, peek_type};
pub use error::{Result, WireError};
pub use group::PrivateGroup;
pub use message::{
    AbortMessage, InviteMessage, JoinMessage, LeaveMessage, MembershipMessage, MessageType,
    ProtocolMessage, RawMessage,
};
pub use signing::{
    invite_signature_payload, sign_invitation, verify_invitation, SIGNING_LABEL_INVITE,
};
