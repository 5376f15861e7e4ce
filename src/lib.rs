//! Covey Core Library
//!
//! Core functionality for Covey - private group invitations between
//! contacts. A group creator invites contacts over their pairwise
//! conversation, invitees accept or decline, and members who already know
//! each other can reveal that relationship inside the group.
//!
//! The crate owns the invitation protocol state. Message transport, the
//! private group content and the UI live in the host application;
//! [`GroupInvitationManager`] is the single entry point.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ids;
pub mod manager;
pub mod membership;
pub mod session;
pub mod storage;
pub mod wire;

pub use clock::{Clock, SystemClock};
pub use config::InvitationConfig;
pub use error::{InvitationError, Result};
pub use identity::{Author, LocalAuthor};
pub use ids::{AuthorId, ContactId, GroupId, MessageId, SessionId};
pub use manager::{
    DeletionResult, EventListener, GroupInvitationItem, GroupInvitationManager, InvitationEvent,
    InvitationMessage, InvitationRequest, InvitationResponse,
};
pub use session::{AnySession, Role, Visibility};
pub use storage::Contact;
pub use wire::{PrivateGroup, RawMessage};
