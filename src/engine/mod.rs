//! Role state machines.
//!
//! Each side of a (contact, private group) pair runs exactly one engine:
//! the group creator runs [`CreatorEngine`], the invited contact runs
//! [`InviteeEngine`], and two members introduced to each other through a
//! shared group run [`PeerEngine`]. Engines are stateless; every call takes
//! the current session by value and returns the next one.
//!
//! Remote protocol violations are handled inside the engines by the abort
//! path and never surface as errors. Errors are returned only for local
//! actions that make no sense in the current state or role, and for
//! storage failures, which roll back the caller's transaction.

mod common;
mod creator;
mod invitee;
mod peer;

use rusqlite::Connection;

pub use creator::CreatorEngine;
pub use invitee::InviteeEngine;
pub use peer::PeerEngine;

use crate::clock::Clock;
use crate::error::Result;
use crate::identity::LocalAuthor;
use crate::manager::InvitationEvent;
use crate::membership::GroupMembership;
use crate::session::{Session, State};
use crate::storage::Contact;
use crate::wire::{AbortMessage, InviteMessage, JoinMessage, LeaveMessage, ProtocolMessage};

/// Everything an engine may touch while handling one operation.
///
/// A context lives for a single storage transaction. Events raised by the
/// engines are collected here and delivered by the manager once the
/// transaction has committed.
pub struct EngineContext<'a> {
    /// The open transaction.
    pub conn: &'a Connection,
    pub membership: &'a dyn GroupMembership,
    pub clock: &'a dyn Clock,
    pub local_author: &'a LocalAuthor,
    /// The contact on the other end of the session.
    pub contact: Contact,
    pub events: Vec<InvitationEvent>,
}

impl<'a> EngineContext<'a> {
    /// Creates a context for one operation with `contact`.
    pub fn new(
        conn: &'a Connection,
        membership: &'a dyn GroupMembership,
        clock: &'a dyn Clock,
        local_author: &'a LocalAuthor,
        contact: Contact,
    ) -> Self {
        Self {
            conn,
            membership,
            clock,
            local_author,
            contact,
            events: Vec::new(),
        }
    }
}

/// The operations every role engine answers.
///
/// Local actions (`on_*_action`) come from the user or from the private
/// group manager; messages (`on_*_message`) come from the contact.
pub trait ProtocolEngine {
    /// The role's state enum.
    type State: State;

    /// The local user invites the contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is invalid for the role or state, or
    /// storage fails.
    fn on_invite_action(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        text: Option<&str>,
        timestamp: i64,
        signature: &[u8],
    ) -> Result<Session<Self::State>>;

    /// The local user joins the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is invalid for the role or state, or
    /// storage fails.
    fn on_join_action(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
    ) -> Result<Session<Self::State>>;

    /// The local user leaves the group or declines the invitation.
    ///
    /// `is_auto_decline` marks a decline triggered by the invitation
    /// expiring rather than by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is invalid for the role or state, or
    /// storage fails.
    fn on_leave_action(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        is_auto_decline: bool,
    ) -> Result<Session<Self::State>>;

    /// The contact became a member of a group we belong to.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is invalid for the role or state, or
    /// storage fails.
    fn on_member_added_action(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
    ) -> Result<Session<Self::State>>;

    /// An invite arrived.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn on_invite_message(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        message: &InviteMessage,
    ) -> Result<Session<Self::State>>;

    /// A join arrived.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn on_join_message(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        message: &JoinMessage,
    ) -> Result<Session<Self::State>>;

    /// A leave arrived.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn on_leave_message(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        message: &LeaveMessage,
    ) -> Result<Session<Self::State>>;

    /// An abort arrived.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn on_abort_message(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        message: &AbortMessage,
    ) -> Result<Session<Self::State>>;

    /// Routes a decoded message to the matching handler.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn on_message(
        &self,
        ctx: &mut EngineContext<'_>,
        session: Session<Self::State>,
        message: &ProtocolMessage,
    ) -> Result<Session<Self::State>> {
        match message {
            ProtocolMessage::Invite(m) => self.on_invite_message(ctx, session, m),
            ProtocolMessage::Join(m) => self.on_join_message(ctx, session, m),
            ProtocolMessage::Leave(m) => self.on_leave_message(ctx, session, m),
            ProtocolMessage::Abort(m) => self.on_abort_message(ctx, session, m),
        }
    }
}
