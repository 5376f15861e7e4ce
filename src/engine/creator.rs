//! Engine for the creator of a private group inviting one contact.

use super::common::{
    abort, mark_visible_in_ui, receive_auto_delete_timer, send_invite, send_join, send_leave,
    set_visibility, valid_dependency,
};
use super::{EngineContext, ProtocolEngine};
use crate::error::{InvitationError, Result};
use crate::manager::{InvitationEvent, InvitationResponse};
use crate::session::{CreatorSession, CreatorState, Role, Visibility};
use crate::wire::{AbortMessage, InviteMessage, JoinMessage, LeaveMessage, MembershipMessage};

#[derive(Debug, Default, Clone, Copy)]
pub struct CreatorEngine;

impl CreatorEngine {
    /// Checks a response against the invitation it answers.
    fn response_violation(s: &CreatorSession, m: &MembershipMessage) -> Option<&'static str> {
        if m.timestamp <= s.invite_timestamp {
            Some("response is not newer than the invitation")
        } else if !valid_dependency(s, m.previous_message_id.as_ref()) {
            Some("response does not follow our last message")
        } else {
            None
        }
    }

    fn response_received(ctx: &mut EngineContext<'_>, m: &MembershipMessage, accepted: bool) -> Result<()> {
        mark_visible_in_ui(ctx, &m.id)?;
        receive_auto_delete_timer(ctx, m.auto_delete_timer, m.timestamp)?;
        let contact_id = ctx.contact.id;
        ctx.events.push(InvitationEvent::InvitationResponseReceived {
            contact_id,
            response: InvitationResponse::received(m, contact_id, accepted),
        });
        Ok(())
    }

    fn on_remote_accept(
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        m: &JoinMessage,
    ) -> Result<CreatorSession> {
        if let Some(reason) = Self::response_violation(&s, m) {
            return abort(ctx, s, reason);
        }
        let sent = send_join(ctx, &s, false)?;
        Self::response_received(ctx, m, true)?;
        set_visibility(ctx, &s, Visibility::Shared)?;
        Ok(CreatorSession {
            last_local_message_id: Some(sent.id),
            last_remote_message_id: Some(m.id),
            local_timestamp: sent.timestamp,
            state: CreatorState::Joined,
            ..s
        })
    }

    fn on_remote_decline(
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        m: &LeaveMessage,
    ) -> Result<CreatorSession> {
        if let Some(reason) = Self::response_violation(&s, m) {
            return abort(ctx, s, reason);
        }
        Self::response_received(ctx, m, false)?;
        Ok(CreatorSession {
            last_remote_message_id: Some(m.id),
            state: CreatorState::Start,
            ..s
        })
    }

    fn on_remote_leave(ctx: &EngineContext<'_>, s: CreatorSession, m: &LeaveMessage) -> Result<CreatorSession> {
        if let Some(reason) = Self::response_violation(&s, m) {
            return abort(ctx, s, reason);
        }
        set_visibility(ctx, &s, Visibility::Invisible)?;
        Ok(CreatorSession {
            last_remote_message_id: Some(m.id),
            state: CreatorState::Left,
            ..s
        })
    }
}

impl ProtocolEngine for CreatorEngine {
    type State = CreatorState;

    fn on_invite_action(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        text: Option<&str>,
        timestamp: i64,
        signature: &[u8],
    ) -> Result<CreatorSession> {
        if s.state != CreatorState::Start {
            return Err(InvitationError::ProtocolState(format!(
                "Cannot invite from {:?}",
                s.state
            )));
        }
        let sent = send_invite(ctx, &s, text, timestamp, signature)?;
        set_visibility(ctx, &s, Visibility::Invisible)?;
        log::debug!("Invited contact {} to {}", ctx.contact.id, s.private_group_id.short());
        Ok(CreatorSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: timestamp.max(s.local_timestamp),
            invite_timestamp: timestamp,
            state: CreatorState::Invited,
            ..s
        })
    }

    fn on_join_action(&self, _ctx: &mut EngineContext<'_>, _s: CreatorSession) -> Result<CreatorSession> {
        Err(InvitationError::InvalidRole {
            role: Role::Creator,
            operation: "join",
        })
    }

    fn on_leave_action(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        _is_auto_decline: bool,
    ) -> Result<CreatorSession> {
        match s.state {
            CreatorState::Start | CreatorState::Dissolved | CreatorState::Error => Ok(s),
            CreatorState::Invited | CreatorState::Joined | CreatorState::Left => {
                set_visibility(ctx, &s, Visibility::Invisible)?;
                let sent = send_leave(ctx, &s, false, false)?;
                Ok(CreatorSession {
                    last_local_message_id: Some(sent.id),
                    local_timestamp: sent.timestamp,
                    state: CreatorState::Dissolved,
                    ..s
                })
            }
        }
    }

    fn on_member_added_action(
        &self,
        _ctx: &mut EngineContext<'_>,
        _s: CreatorSession,
    ) -> Result<CreatorSession> {
        Err(InvitationError::InvalidRole {
            role: Role::Creator,
            operation: "member added",
        })
    }

    fn on_invite_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        _m: &InviteMessage,
    ) -> Result<CreatorSession> {
        abort(ctx, s, "creator received an invitation")
    }

    fn on_join_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        m: &JoinMessage,
    ) -> Result<CreatorSession> {
        match s.state {
            CreatorState::Start | CreatorState::Joined | CreatorState::Left => {
                abort(ctx, s, "unexpected join")
            }
            CreatorState::Invited => Self::on_remote_accept(ctx, s, m),
            CreatorState::Dissolved | CreatorState::Error => Ok(s),
        }
    }

    fn on_leave_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        m: &LeaveMessage,
    ) -> Result<CreatorSession> {
        match s.state {
            CreatorState::Start | CreatorState::Left => abort(ctx, s, "unexpected leave"),
            CreatorState::Invited => Self::on_remote_decline(ctx, s, m),
            CreatorState::Joined => Self::on_remote_leave(ctx, s, m),
            CreatorState::Dissolved | CreatorState::Error => Ok(s),
        }
    }

    fn on_abort_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: CreatorSession,
        _m: &AbortMessage,
    ) -> Result<CreatorSession> {
        abort(ctx, s, "contact aborted")
    }
}
