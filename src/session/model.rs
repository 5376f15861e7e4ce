//! The per-(contact, private group) session value.

use super::state::{CreatorState, InviteeState, PeerState, Role, State, Visibility};
use crate::ids::{GroupId, MessageId, SessionId};

/// Protocol state shared with one contact about one private group.
///
/// Sessions are plain values: role engines take one and return the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session<S: State> {
    pub contact_group_id: GroupId,
    pub private_group_id: GroupId,
    /// Last message we sent in this session.
    pub last_local_message_id: Option<MessageId>,
    /// Last message we accepted from the contact in this session.
    pub last_remote_message_id: Option<MessageId>,
    /// Timestamp of the last message we sent.
    pub local_timestamp: i64,
    /// Timestamp of the invitation, or zero if none was exchanged.
    pub invite_timestamp: i64,
    pub state: S,
}

pub type CreatorSession = Session<CreatorState>;
pub type InviteeSession = Session<InviteeState>;
pub type PeerSession = Session<PeerState>;

impl<S: State> Session<S> {
    /// Creates a session in its role's initial state.
    #[must_use]
    pub fn new(contact_group_id: GroupId, private_group_id: GroupId) -> Self {
        Self {
            contact_group_id,
            private_group_id,
            last_local_message_id: None,
            last_remote_message_id: None,
            local_timestamp: 0,
            invite_timestamp: 0,
            state: S::start(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::from(self.private_group_id)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        S::ROLE
    }

    /// Latest timestamp this session has produced or observed.
    #[must_use]
    pub fn session_timestamp(&self) -> i64 {
        self.local_timestamp.max(self.invite_timestamp)
    }

    /// Returns a copy moved to `state`.
    #[must_use]
    pub fn with_state(self, state: S) -> Self {
        Self { state, ..self }
    }
}

/// A session of any role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnySession {
    Creator(CreatorSession),
    Invitee(InviteeSession),
    Peer(PeerSession),
}

macro_rules! each_session {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AnySession::Creator($s) => $body,
            AnySession::Invitee($s) => $body,
            AnySession::Peer($s) => $body,
        }
    };
}

impl AnySession {
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Creator(_) => Role::Creator,
            Self::Invitee(_) => Role::Invitee,
            Self::Peer(_) => Role::Peer,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        each_session!(self, s => s.session_id())
    }

    #[must_use]
    pub fn contact_group_id(&self) -> GroupId {
        each_session!(self, s => s.contact_group_id)
    }

    #[must_use]
    pub fn private_group_id(&self) -> GroupId {
        each_session!(self, s => s.private_group_id)
    }

    #[must_use]
    pub fn last_local_message_id(&self) -> Option<MessageId> {
        each_session!(self, s => s.last_local_message_id)
    }

    #[must_use]
    pub fn last_remote_message_id(&self) -> Option<MessageId> {
        each_session!(self, s => s.last_remote_message_id)
    }

    #[must_use]
    pub fn local_timestamp(&self) -> i64 {
        each_session!(self, s => s.local_timestamp)
    }

    #[must_use]
    pub fn invite_timestamp(&self) -> i64 {
        each_session!(self, s => s.invite_timestamp)
    }

    /// Numeric value of the role-specific state.
    #[must_use]
    pub fn state_value(&self) -> u8 {
        each_session!(self, s => s.state.value())
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        each_session!(self, s => s.state.visibility())
    }

    #[must_use]
    pub fn is_awaiting_response(&self) -> bool {
        each_session!(self, s => s.state.is_awaiting_response())
    }

    /// Name of the current state, for logs.
    #[must_use]
    pub fn state_name(&self) -> String {
        each_session!(self, s => format!("{:?}", s.state))
    }

    /// Whether the session is in its role's error state.
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            Self::Creator(s) => s.state == CreatorState::Error,
            Self::Invitee(s) => s.state == InviteeState::Error,
            Self::Peer(s) => s.state == PeerState::Error,
        }
    }
}

impl From<CreatorSession> for AnySession {
    fn from(s: CreatorSession) -> Self {
        Self::Creator(s)
    }
}

impl From<InviteeSession> for AnySession {
    fn from(s: InviteeSession) -> Self {
        Self::Invitee(s)
    }
}

impl From<PeerSession> for AnySession {
    fn from(s: PeerSession) -> Self {
        Self::Peer(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_clean() {
        let s = PeerSession::new(GroupId::from_bytes([1; 32]), GroupId::from_bytes([2; 32]));
        assert_eq!(s.state, PeerState::Start);
        assert_eq!(s.role(), Role::Peer);
        assert_eq!(s.session_id().as_bytes(), &[2; 32]);
        assert!(s.last_local_message_id.is_none());
        assert!(s.last_remote_message_id.is_none());
    }

    #[test]
    fn session_timestamp_is_max() {
        let mut s = CreatorSession::new(GroupId::from_bytes([1; 32]), GroupId::from_bytes([2; 32]));
        s.local_timestamp = 10;
        s.invite_timestamp = 20;
        assert_eq!(s.session_timestamp(), 20);
        s.local_timestamp = 30;
        assert_eq!(s.session_timestamp(), 30);
    }

    #[test]
    fn any_session_delegates() {
        let s = InviteeSession::new(GroupId::from_bytes([1; 32]), GroupId::from_bytes([2; 32]))
            .with_state(InviteeState::Invited);
        let any = AnySession::from(s);
        assert_eq!(any.role(), Role::Invitee);
        assert!(any.is_awaiting_response());
        assert!(!any.is_error());
        assert_eq!(any.state_value(), 1);
        assert_eq!(any.contact_group_id(), GroupId::from_bytes([1; 32]));
    }
}
