//! Engine for two members of the same private group introducing themselves.
//!
//! Neither side invited the other, so there is no invitation timestamp to
//! check; only the causal pointer of each message is validated.

use super::common::{abort, relationship_revealed, send_join, send_leave, set_visibility, valid_dependency};
use super::{EngineContext, ProtocolEngine};
use crate::error::{InvitationError, Result};
use crate::session::{PeerSession, PeerState, Role, Visibility};
use crate::wire::{AbortMessage, InviteMessage, JoinMessage, LeaveMessage, MembershipMessage};

#[derive(Debug, Default, Clone, Copy)]
pub struct PeerEngine;

impl PeerEngine {
    /// Sends a join and moves to `state`, exposing the group as `visibility`.
    fn local_join(
        ctx: &EngineContext<'_>,
        s: PeerSession,
        visibility: Visibility,
        state: PeerState,
    ) -> Result<PeerSession> {
        let sent = send_join(ctx, &s, false)?;
        set_visibility(ctx, &s, visibility)?;
        Ok(PeerSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: sent.timestamp,
            state,
            ..s
        })
    }

    fn local_leave(ctx: &EngineContext<'_>, s: PeerSession, state: PeerState) -> Result<PeerSession> {
        let sent = send_leave(ctx, &s, false, false)?;
        set_visibility(ctx, &s, Visibility::Invisible)?;
        Ok(PeerSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: sent.timestamp,
            state,
            ..s
        })
    }

    /// Accepts a remote message that needs no reply.
    const fn remote(s: PeerSession, m: &MembershipMessage, state: PeerState) -> PeerSession {
        PeerSession {
            last_remote_message_id: Some(m.id),
            state,
            ..s
        }
    }

    fn on_remote_join_from_neither_joined(
        ctx: &EngineContext<'_>,
        s: PeerSession,
        m: &JoinMessage,
    ) -> Result<PeerSession> {
        let sent = send_join(ctx, &s, false)?;
        set_visibility(ctx, &s, Visibility::Shared)?;
        relationship_revealed(ctx, &s, true)?;
        Ok(PeerSession {
            last_local_message_id: Some(sent.id),
            last_remote_message_id: Some(m.id),
            local_timestamp: sent.timestamp,
            state: PeerState::BothJoined,
            ..s
        })
    }

    fn on_remote_join_from_local_joined(
        ctx: &EngineContext<'_>,
        s: PeerSession,
        m: &JoinMessage,
    ) -> Result<PeerSession> {
        set_visibility(ctx, &s, Visibility::Shared)?;
        relationship_revealed(ctx, &s, false)?;
        Ok(Self::remote(s, m, PeerState::BothJoined))
    }
}

impl ProtocolEngine for PeerEngine {
    type State = PeerState;

    fn on_invite_action(
        &self,
        _ctx: &mut EngineContext<'_>,
        _s: PeerSession,
        _text: Option<&str>,
        _timestamp: i64,
        _signature: &[u8],
    ) -> Result<PeerSession> {
        Err(InvitationError::InvalidRole {
            role: Role::Peer,
            operation: "invite",
        })
    }

    fn on_join_action(&self, ctx: &mut EngineContext<'_>, s: PeerSession) -> Result<PeerSession> {
        match s.state {
            PeerState::NeitherJoined => Self::local_join(ctx, s, Visibility::Visible, PeerState::LocalJoined),
            PeerState::LocalLeft => Self::local_join(ctx, s, Visibility::Shared, PeerState::BothJoined),
            state => Err(InvitationError::ProtocolState(format!("Cannot join from {state:?}"))),
        }
    }

    fn on_leave_action(
        &self,
        ctx: &mut EngineContext<'_>,
        s: PeerSession,
        _is_auto_decline: bool,
    ) -> Result<PeerSession> {
        match s.state {
            PeerState::LocalJoined => Self::local_leave(ctx, s, PeerState::NeitherJoined),
            PeerState::BothJoined => Self::local_leave(ctx, s, PeerState::LocalLeft),
            PeerState::Start
            | PeerState::AwaitMember
            | PeerState::NeitherJoined
            | PeerState::LocalLeft
            | PeerState::Error => Ok(s),
        }
    }

    fn on_member_added_action(&self, ctx: &mut EngineContext<'_>, s: PeerSession) -> Result<PeerSession> {
        match s.state {
            PeerState::Start => Ok(s.with_state(PeerState::NeitherJoined)),
            PeerState::AwaitMember => {
                let next = Self::local_join(ctx, s, Visibility::Shared, PeerState::BothJoined)?;
                relationship_revealed(ctx, &s, true)?;
                Ok(next)
            }
            PeerState::Error => Ok(s),
            state => Err(InvitationError::ProtocolState(format!(
                "Member already added in {state:?}"
            ))),
        }
    }

    fn on_invite_message(&self, ctx: &mut EngineContext<'_>, s: PeerSession, _m: &InviteMessage) -> Result<PeerSession> {
        abort(ctx, s, "peer received an invitation")
    }

    fn on_join_message(&self, ctx: &mut EngineContext<'_>, s: PeerSession, m: &JoinMessage) -> Result<PeerSession> {
        match s.state {
            PeerState::Start | PeerState::NeitherJoined | PeerState::LocalJoined
                if !valid_dependency(&s, m.previous_message_id.as_ref()) =>
            {
                abort(ctx, s, "join does not follow our last message")
            }
            PeerState::Start => Ok(Self::remote(s, m, PeerState::AwaitMember)),
            PeerState::NeitherJoined => Self::on_remote_join_from_neither_joined(ctx, s, m),
            PeerState::LocalJoined => Self::on_remote_join_from_local_joined(ctx, s, m),
            PeerState::AwaitMember | PeerState::BothJoined | PeerState::LocalLeft => {
                abort(ctx, s, "unexpected join")
            }
            PeerState::Error => Ok(s),
        }
    }

    fn on_leave_message(&self, ctx: &mut EngineContext<'_>, s: PeerSession, m: &LeaveMessage) -> Result<PeerSession> {
        match s.state {
            PeerState::AwaitMember | PeerState::LocalLeft | PeerState::BothJoined
                if !valid_dependency(&s, m.previous_message_id.as_ref()) =>
            {
                abort(ctx, s, "leave does not follow our last message")
            }
            PeerState::AwaitMember => Ok(Self::remote(s, m, PeerState::Start)),
            PeerState::LocalLeft => Ok(Self::remote(s, m, PeerState::NeitherJoined)),
            PeerState::BothJoined => {
                set_visibility(ctx, &s, Visibility::Visible)?;
                Ok(Self::remote(s, m, PeerState::LocalJoined))
            }
            PeerState::Start | PeerState::NeitherJoined | PeerState::LocalJoined => {
                abort(ctx, s, "unexpected leave")
            }
            PeerState::Error => Ok(s),
        }
    }

    fn on_abort_message(&self, ctx: &mut EngineContext<'_>, s: PeerSession, _m: &AbortMessage) -> Result<PeerSession> {
        abort(ctx, s, "contact aborted")
    }
}
