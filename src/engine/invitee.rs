//! Engine for a contact invited to someone else's private group.

use super::common::{
    abort, is_subscribed, mark_visible_in_ui, receive_auto_delete_timer, send_join, send_leave,
    set_visibility, valid_dependency,
};
use super::{EngineContext, ProtocolEngine};
use crate::error::{InvitationError, Result};
use crate::ids::MessageId;
use crate::manager::{InvitationEvent, InvitationRequest};
use crate::session::{InviteeSession, InviteeState, Role, Visibility};
use crate::storage::messages;
use crate::wire::{
    decode, AbortMessage, InviteMessage, JoinMessage, LeaveMessage, MembershipMessage, PrivateGroup,
    ProtocolMessage,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct InviteeEngine;

impl InviteeEngine {
    fn violation(s: &InviteeSession, m: &MembershipMessage) -> Option<&'static str> {
        if m.timestamp <= s.invite_timestamp {
            Some("message is not newer than the invitation")
        } else if !valid_dependency(s, m.previous_message_id.as_ref()) {
            Some("message does not follow our last message")
        } else {
            None
        }
    }

    fn abort(ctx: &EngineContext<'_>, s: InviteeSession, reason: &str) -> Result<InviteeSession> {
        if s.state == InviteeState::Error {
            return Ok(s);
        }
        messages::mark_invites_unavailable(ctx.conn, &s.contact_group_id, &s.private_group_id)?;
        abort(ctx, s, reason)
    }

    /// The invitation we are answering.
    fn invite_id(s: &InviteeSession) -> Result<MessageId> {
        s.last_remote_message_id.ok_or_else(|| {
            InvitationError::ProtocolState(format!(
                "No invitation recorded for {}",
                s.private_group_id.short()
            ))
        })
    }

    /// Subscribes to the group described by the stored invitation.
    fn subscribe(ctx: &EngineContext<'_>, s: &InviteeSession) -> Result<()> {
        let invite_id = Self::invite_id(s)?;
        let stored = messages::get_message(ctx.conn, &invite_id)?
            .ok_or_else(|| InvitationError::InvalidData(format!("Invitation {} is missing", invite_id.short())))?;
        let ProtocolMessage::Invite(invite) = decode(&stored.raw())? else {
            return Err(InvitationError::InvalidData(format!(
                "Message {} is not an invitation",
                invite_id.short()
            )));
        };
        let group = PrivateGroup::new(invite.group_name, invite.creator, invite.salt)?;
        let joined_at = ctx.clock.now_millis().max(invite.timestamp.saturating_add(1));
        ctx.membership.add_private_group(ctx.conn, &group, joined_at)?;
        ctx.membership
            .add_member(ctx.conn, group.id(), ctx.local_author.author())
    }

    fn on_local_accept(ctx: &EngineContext<'_>, s: InviteeSession) -> Result<InviteeSession> {
        let invite_id = Self::invite_id(&s)?;
        messages::set_available_to_answer(ctx.conn, &invite_id, false)?;
        messages::set_accepted(ctx.conn, &invite_id)?;
        let sent = send_join(ctx, &s, true)?;
        Self::subscribe(ctx, &s)?;
        set_visibility(ctx, &s, Visibility::Visible)?;
        log::debug!("Accepted invitation to {}", s.private_group_id.short());
        Ok(InviteeSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: sent.timestamp,
            state: InviteeState::Accepted,
            ..s
        })
    }

    fn on_local_decline(ctx: &EngineContext<'_>, s: InviteeSession, is_auto_decline: bool) -> Result<InviteeSession> {
        let invite_id = Self::invite_id(&s)?;
        messages::set_available_to_answer(ctx.conn, &invite_id, false)?;
        let sent = send_leave(ctx, &s, true, is_auto_decline)?;
        log::debug!(
            "Declined invitation to {} (automatic: {is_auto_decline})",
            s.private_group_id.short()
        );
        Ok(InviteeSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: sent.timestamp,
            state: InviteeState::Start,
            ..s
        })
    }

    fn on_local_leave(ctx: &EngineContext<'_>, s: InviteeSession) -> Result<InviteeSession> {
        let sent = send_leave(ctx, &s, false, false)?;
        set_visibility(ctx, &s, Visibility::Invisible)?;
        Ok(InviteeSession {
            last_local_message_id: Some(sent.id),
            local_timestamp: sent.timestamp,
            state: InviteeState::Left,
            ..s
        })
    }

    fn on_remote_invite(
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        m: &InviteMessage,
    ) -> Result<InviteeSession> {
        if m.timestamp <= s.invite_timestamp {
            return Self::abort(ctx, s, "invitation is not newer than the last one");
        }
        if !ctx.contact.author.is(m.creator.id()) {
            return Self::abort(ctx, s, "invitation was not sent by the group creator");
        }
        mark_visible_in_ui(ctx, &m.id)?;
        messages::set_available_to_answer(ctx.conn, &m.id, true)?;
        receive_auto_delete_timer(ctx, m.auto_delete_timer, m.timestamp)?;
        let contact_id = ctx.contact.id;
        ctx.events.push(InvitationEvent::InvitationReceived {
            contact_id,
            request: InvitationRequest::received(m, contact_id),
        });
        Ok(InviteeSession {
            last_remote_message_id: Some(m.id),
            invite_timestamp: m.timestamp,
            state: InviteeState::Invited,
            ..s
        })
    }

    fn on_remote_join(ctx: &EngineContext<'_>, s: InviteeSession, m: &JoinMessage) -> Result<InviteeSession> {
        if let Some(reason) = Self::violation(&s, m) {
            return Self::abort(ctx, s, reason);
        }
        set_visibility(ctx, &s, Visibility::Shared)?;
        Ok(InviteeSession {
            last_remote_message_id: Some(m.id),
            state: InviteeState::Joined,
            ..s
        })
    }

    fn on_remote_leave(ctx: &EngineContext<'_>, s: InviteeSession, m: &LeaveMessage) -> Result<InviteeSession> {
        if let Some(reason) = Self::violation(&s, m) {
            return Self::abort(ctx, s, reason);
        }
        if matches!(s.state, InviteeState::Accepted | InviteeState::Joined) {
            set_visibility(ctx, &s, Visibility::Invisible)?;
            if is_subscribed(ctx, &s.private_group_id)? {
                ctx.membership.mark_group_dissolved(ctx.conn, &s.private_group_id)?;
            }
        } else {
            messages::mark_invites_unavailable(ctx.conn, &s.contact_group_id, &s.private_group_id)?;
        }
        log::debug!("Group {} was dissolved by its creator", s.private_group_id.short());
        Ok(InviteeSession {
            last_remote_message_id: Some(m.id),
            state: InviteeState::Dissolved,
            ..s
        })
    }
}

impl ProtocolEngine for InviteeEngine {
    type State = InviteeState;

    fn on_invite_action(
        &self,
        _ctx: &mut EngineContext<'_>,
        _s: InviteeSession,
        _text: Option<&str>,
        _timestamp: i64,
        _signature: &[u8],
    ) -> Result<InviteeSession> {
        Err(InvitationError::InvalidRole {
            role: Role::Invitee,
            operation: "invite",
        })
    }

    fn on_join_action(&self, ctx: &mut EngineContext<'_>, s: InviteeSession) -> Result<InviteeSession> {
        match s.state {
            InviteeState::Invited => Self::on_local_accept(ctx, s),
            state => Err(InvitationError::ProtocolState(format!(
                "Cannot accept an invitation from {state:?}"
            ))),
        }
    }

    fn on_leave_action(
        &self,
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        is_auto_decline: bool,
    ) -> Result<InviteeSession> {
        match s.state {
            InviteeState::Start | InviteeState::Left | InviteeState::Dissolved | InviteeState::Error => Ok(s),
            InviteeState::Invited => Self::on_local_decline(ctx, s, is_auto_decline),
            InviteeState::Accepted | InviteeState::Joined => Self::on_local_leave(ctx, s),
        }
    }

    fn on_member_added_action(
        &self,
        _ctx: &mut EngineContext<'_>,
        _s: InviteeSession,
    ) -> Result<InviteeSession> {
        Err(InvitationError::InvalidRole {
            role: Role::Invitee,
            operation: "member added",
        })
    }

    fn on_invite_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        m: &InviteMessage,
    ) -> Result<InviteeSession> {
        match s.state {
            InviteeState::Start => Self::on_remote_invite(ctx, s, m),
            InviteeState::Error => Ok(s),
            _ => Self::abort(ctx, s, "unexpected invitation"),
        }
    }

    fn on_join_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        m: &JoinMessage,
    ) -> Result<InviteeSession> {
        match s.state {
            InviteeState::Accepted => Self::on_remote_join(ctx, s, m),
            InviteeState::Error => Ok(s),
            _ => Self::abort(ctx, s, "unexpected join"),
        }
    }

    fn on_leave_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        m: &LeaveMessage,
    ) -> Result<InviteeSession> {
        match s.state {
            InviteeState::Start | InviteeState::Dissolved => Self::abort(ctx, s, "unexpected leave"),
            InviteeState::Invited | InviteeState::Left | InviteeState::Accepted | InviteeState::Joined => {
                Self::on_remote_leave(ctx, s, m)
            }
            InviteeState::Error => Ok(s),
        }
    }

    fn on_abort_message(
        &self,
        ctx: &mut EngineContext<'_>,
        s: InviteeSession,
        _m: &AbortMessage,
    ) -> Result<InviteeSession> {
        Self::abort(ctx, s, "contact aborted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{Fixture, NOW};
    use crate::storage::{MessageFilter, StoredMessage};
    use crate::wire::{encode_invite, encode_join, encode_leave, sign_invitation, MessageType, RawMessage};

    /// An invitation from the contact to their own group.
    fn invite_raw(fx: &Fixture, group: &PrivateGroup, timestamp: i64) -> RawMessage {
        let signature = sign_invitation(&fx.remote, &fx.cg(), group.id(), timestamp).unwrap();
        encode_invite(fx.cg(), timestamp, group, Some("come along"), &signature, None).unwrap()
    }

    fn receive(fx: &Fixture, raw: &RawMessage) -> ProtocolMessage {
        let m = decode(raw).unwrap();
        fx.with_ctx(|ctx| {
            let stored = StoredMessage::incoming(raw, *m.private_group_id(), m.message_type());
            messages::insert_message(ctx.conn, &stored)?;
            Ok(())
        });
        m
    }

    fn invited(fx: &Fixture) -> (InviteeSession, RawMessage) {
        let group = fx.remote_group();
        let raw = invite_raw(fx, &group, NOW - 100);
        let m = receive(fx, &raw);
        let s = InviteeSession::new(fx.cg(), *group.id());
        (fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m)), raw)
    }

    fn accepted(fx: &Fixture) -> InviteeSession {
        let (s, _) = invited(fx);
        fx.with_ctx(|ctx| InviteeEngine.on_join_action(ctx, s))
    }

    fn visibility(fx: &Fixture, s: &InviteeSession) -> Visibility {
        fx.with_ctx(|ctx| ctx.membership.get_group_visibility(ctx.conn, ctx.contact.id, &s.private_group_id))
    }

    #[test]
    fn invitation_is_recorded_and_announced() {
        let fx = Fixture::new(false);
        let group = fx.remote_group();
        let raw = invite_raw(&fx, &group, NOW - 100);
        let m = receive(&fx, &raw);
        let s = InviteeSession::new(fx.cg(), *group.id());

        let (next, events) = fx.with_ctx(|ctx| {
            let next = InviteeEngine.on_message(ctx, s, &m)?;
            Ok((next, std::mem::take(&mut ctx.events)))
        });
        assert_eq!(next.state, InviteeState::Invited);
        assert_eq!(next.invite_timestamp, NOW - 100);
        assert_eq!(next.last_remote_message_id, Some(raw.id));
        assert!(matches!(
            events.as_slice(),
            [InvitationEvent::InvitationReceived { request, .. }] if request.group_name == "Hiking"
        ));

        let stored = fx.with_ctx(|ctx| messages::get_message(ctx.conn, &raw.id)).unwrap();
        assert!(stored.visible_in_ui);
        assert!(stored.available_to_answer);
    }

    #[test]
    fn invitation_from_non_creator_aborts() {
        let fx = Fixture::new(false);
        // A group created by someone other than the contact
        let stranger = crate::identity::LocalAuthor::generate("stranger").unwrap();
        let group = PrivateGroup::new("Elsewhere", stranger.author().clone(), [3; 32]).unwrap();
        let signature = sign_invitation(&stranger, &fx.cg(), group.id(), NOW).unwrap();
        let raw = encode_invite(fx.cg(), NOW, &group, None, &signature, None).unwrap();
        let m = receive(&fx, &raw);

        let s = InviteeSession::new(fx.cg(), *group.id());
        let next = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m));
        assert_eq!(next.state, InviteeState::Error);
        let stored = fx.with_ctx(|ctx| messages::get_message(ctx.conn, &raw.id)).unwrap();
        assert!(!stored.available_to_answer);
    }

    #[test]
    fn accept_subscribes_and_makes_visible() {
        let fx = Fixture::new(false);
        let s = accepted(&fx);
        assert_eq!(s.state, InviteeState::Accepted);
        assert_eq!(visibility(&fx, &s), Visibility::Visible);

        fx.with_ctx(|ctx| {
            assert!(ctx.membership.contains_group(ctx.conn, &s.private_group_id)?);
            assert!(ctx.membership.is_member(ctx.conn, &s.private_group_id, fx.local.author().id())?);
            let invite = messages::get_message(ctx.conn, &s.last_remote_message_id.unwrap())?.unwrap();
            assert!(invite.accepted);
            assert!(!invite.available_to_answer);
            let join = messages::get_message(ctx.conn, &s.last_local_message_id.unwrap())?.unwrap();
            assert_eq!(join.message_type, MessageType::Join);
            assert!(join.visible_in_ui);
            Ok(())
        });
    }

    #[test]
    fn creator_join_shares_group() {
        let fx = Fixture::new(false);
        let s = accepted(&fx);
        let raw = encode_join(fx.cg(), &s.private_group_id, NOW + 10, s.last_remote_message_id.as_ref(), None).unwrap();
        let m = receive(&fx, &raw);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m));
        assert_eq!(next.state, InviteeState::Joined);
        assert_eq!(visibility(&fx, &next), Visibility::Shared);
    }

    #[test]
    fn decline_returns_to_start() {
        let fx = Fixture::new(false);
        let (s, raw) = invited(&fx);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_leave_action(ctx, s, false));
        assert_eq!(next.state, InviteeState::Start);
        assert_eq!(next.invite_timestamp, s.invite_timestamp);

        fx.with_ctx(|ctx| {
            assert!(!ctx.membership.contains_group(ctx.conn, &s.private_group_id)?);
            let invite = messages::get_message(ctx.conn, &raw.id)?.unwrap();
            assert!(!invite.available_to_answer);
            let leave = messages::get_message(ctx.conn, &next.last_local_message_id.unwrap())?.unwrap();
            assert!(leave.visible_in_ui);
            assert!(!leave.is_auto_decline);
            Ok(())
        });
    }

    #[test]
    fn auto_decline_is_flagged() {
        let fx = Fixture::new(false);
        let (s, _) = invited(&fx);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_leave_action(ctx, s, true));
        let leave = fx
            .with_ctx(|ctx| messages::get_message(ctx.conn, &next.last_local_message_id.unwrap()))
            .unwrap();
        assert!(leave.is_auto_decline);
    }

    #[test]
    fn replayed_invitation_aborts() {
        let fx = Fixture::new(false);
        let group = fx.remote_group();
        let (s, _) = invited(&fx);
        let declined = fx.with_ctx(|ctx| InviteeEngine.on_leave_action(ctx, s, false));

        // Same timestamp as the first invitation, different text so the id differs
        let signature = sign_invitation(&fx.remote, &fx.cg(), group.id(), NOW - 100).unwrap();
        let raw = encode_invite(fx.cg(), NOW - 100, &group, Some("again"), &signature, None).unwrap();
        let m = receive(&fx, &raw);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, declined, &m));
        assert_eq!(next.state, InviteeState::Error);

        // A fresh invitation after a decline is accepted
        let fresh = invite_raw(&fx, &group, NOW + 100);
        let m = receive(&fx, &fresh);
        let reinvited = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, declined, &m));
        assert_eq!(reinvited.state, InviteeState::Invited);
    }

    #[test]
    fn dissolve_while_joined_marks_group() {
        let fx = Fixture::new(false);
        let s = accepted(&fx);
        let raw = encode_leave(fx.cg(), &s.private_group_id, NOW + 10, s.last_remote_message_id.as_ref(), None).unwrap();
        let m = receive(&fx, &raw);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m));
        assert_eq!(next.state, InviteeState::Dissolved);
        assert_eq!(visibility(&fx, &next), Visibility::Invisible);
        assert!(fx.with_ctx(|ctx| ctx.membership.is_dissolved(ctx.conn, &s.private_group_id)));
    }

    #[test]
    fn dissolve_before_answer_withdraws_invitation() {
        let fx = Fixture::new(false);
        let (s, invite) = invited(&fx);
        let raw = encode_leave(fx.cg(), &s.private_group_id, NOW, Some(&invite.id), None).unwrap();
        let m = receive(&fx, &raw);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m));
        assert_eq!(next.state, InviteeState::Dissolved);
        let stored = fx.with_ctx(|ctx| messages::get_message(ctx.conn, &invite.id)).unwrap();
        assert!(!stored.available_to_answer);
    }

    #[test]
    fn local_leave_after_accept() {
        let fx = Fixture::new(false);
        let s = accepted(&fx);
        let next = fx.with_ctx(|ctx| InviteeEngine.on_leave_action(ctx, s, false));
        assert_eq!(next.state, InviteeState::Left);
        assert_eq!(visibility(&fx, &next), Visibility::Invisible);
    }

    #[test]
    fn accept_requires_pending_invitation() {
        let fx = Fixture::new(false);
        let s = InviteeSession::new(fx.cg(), *fx.remote_group().id());
        let result = fx.storage.transaction(|conn| {
            let mut ctx = EngineContext::new(conn, &fx.membership, &fx.clock, &fx.local, fx.contact.clone());
            InviteeEngine.on_join_action(&mut ctx, s)
        });
        assert!(matches!(result, Err(InvitationError::ProtocolState(_))));
    }

    #[test]
    fn abort_withdraws_invitation_once() {
        let fx = Fixture::new(false);
        let (s, invite) = invited(&fx);
        let raw = crate::wire::encode_abort(fx.cg(), &s.private_group_id, NOW).unwrap();
        let m = receive(&fx, &raw);
        let aborted = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, s, &m));
        assert_eq!(aborted.state, InviteeState::Error);
        let again = fx.with_ctx(|ctx| InviteeEngine.on_message(ctx, aborted, &m));
        assert_eq!(again, aborted);

        let sent = fx.with_ctx(|ctx| messages::list_messages(ctx.conn, &fx.cg(), &MessageFilter::new().local(true)));
        assert_eq!(sent.len(), 1);
        let stored = fx.with_ctx(|ctx| messages::get_message(ctx.conn, &invite.id)).unwrap();
        assert!(!stored.available_to_answer);
    }
}
