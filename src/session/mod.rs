//! Session model.
//!
//! One session exists per (contact group, private group) pair. Its role is
//! fixed when it is created; its state moves only through the role engines
//! in [`crate::engine`].
//!
//! # Types
//!
//! - [`Session`]: the record for one role, generic over that role's state
//! - [`AnySession`]: a session of any role, as loaded from storage
//! - [`Visibility`]: how the private group is exposed to the contact, a pure
//!   function of the session state

mod model;
mod record;
mod state;

pub use model::{AnySession, CreatorSession, InviteeSession, PeerSession, Session};
pub use record::{decode_session, encode_session, RecordError, SESSION_RECORD_VERSION};
pub use state::{CreatorState, InviteeState, PeerState, Role, State, Visibility};
