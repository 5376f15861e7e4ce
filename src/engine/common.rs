//! Helpers shared by the three role engines.

use super::EngineContext;
use crate::error::{InvitationError, Result};
use crate::ids::{GroupId, MessageId};
use crate::session::{Session, State, Visibility};
use crate::storage::{contacts, messages, StoredMessage};
use crate::wire::{
    encode_abort, encode_invite, encode_join, encode_leave, MessageType, RawMessage,
};

/// A message we just stored for sending.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sent {
    pub id: MessageId,
    pub timestamp: i64,
}

/// Whether an incoming causal pointer names the last message we received.
///
/// A missing pointer is only valid before anything was received.
pub(crate) fn valid_dependency<S: State>(session: &Session<S>, dependency: Option<&MessageId>) -> bool {
    session.last_remote_message_id.as_ref() == dependency
}

pub(crate) fn is_subscribed(ctx: &EngineContext<'_>, private_group_id: &GroupId) -> Result<bool> {
    ctx.membership.contains_group(ctx.conn, private_group_id)
}

/// Exposes the group to the contact. No-op while we are not subscribed.
pub(crate) fn set_visibility<S: State>(
    ctx: &EngineContext<'_>,
    session: &Session<S>,
    visibility: Visibility,
) -> Result<()> {
    if !is_subscribed(ctx, &session.private_group_id)? {
        return Ok(());
    }
    ctx.membership
        .set_group_visibility(ctx.conn, ctx.contact.id, &session.private_group_id, visibility)
}

/// Records what we learned about the contact's relationship to us in the group.
pub(crate) fn relationship_revealed<S: State>(
    ctx: &EngineContext<'_>,
    session: &Session<S>,
    by_contact: bool,
) -> Result<()> {
    ctx.membership.relationship_revealed(
        ctx.conn,
        &session.private_group_id,
        ctx.contact.author.id(),
        by_contact,
    )
}

// ==================== Timestamps ====================

/// Timestamp for an outgoing message: later than the session timestamp and
/// later than every message already stored for the conversation.
///
/// Ids hash the contact group, timestamp and body, and an abort or a first
/// peer join has the same body on both sides. A strictly later timestamp
/// keeps our message from taking the id of one we already hold.
pub(crate) fn next_timestamp<S: State>(ctx: &EngineContext<'_>, session: &Session<S>) -> Result<i64> {
    let now = ctx.clock.now_millis();
    let conversation = messages::latest_timestamp(ctx.conn, &session.contact_group_id)?
        .map_or(now, |latest| now.max(latest.saturating_add(1)));
    Ok(conversation.max(session.session_timestamp().saturating_add(1)))
}

// ==================== Sending ====================

fn store_outgoing(
    ctx: &EngineContext<'_>,
    raw: &RawMessage,
    private_group_id: GroupId,
    message_type: MessageType,
    visible: bool,
    auto_delete_timer: Option<i64>,
    is_auto_decline: bool,
) -> Result<Sent> {
    let mut stored = StoredMessage::outgoing(raw, private_group_id, message_type);
    stored.visible_in_ui = visible;
    stored.auto_delete_timer = auto_delete_timer;
    stored.is_auto_decline = is_auto_decline;
    if !messages::insert_message(ctx.conn, &stored)? {
        return Err(InvitationError::ProtocolState(format!(
            "Outgoing {message_type:?} {} collides with a stored message",
            raw.id.short()
        )));
    }
    log::debug!(
        "Queued {message_type:?} {} for group {}",
        raw.id.short(),
        private_group_id.short()
    );
    Ok(Sent {
        id: raw.id,
        timestamp: raw.timestamp,
    })
}

/// Sends an invitation to the group the session is about.
///
/// The invite uses the caller's timestamp because the signature covers it.
pub(crate) fn send_invite<S: State>(
    ctx: &EngineContext<'_>,
    session: &Session<S>,
    text: Option<&str>,
    timestamp: i64,
    signature: &[u8],
) -> Result<Sent> {
    let group = ctx
        .membership
        .get_private_group(ctx.conn, &session.private_group_id)?
        .ok_or_else(|| InvitationError::GroupNotFound(session.private_group_id.to_hex()))?;
    let timer = ctx.contact.outgoing_timer();
    let raw = encode_invite(session.contact_group_id, timestamp, &group, text, signature, timer)?;
    store_outgoing(ctx, &raw, session.private_group_id, MessageType::Invite, true, timer, false)
}

/// Sends a join. Visible joins answer an invitation and carry the timer.
pub(crate) fn send_join<S: State>(ctx: &EngineContext<'_>, session: &Session<S>, visible: bool) -> Result<Sent> {
    let timestamp = next_timestamp(ctx, session)?;
    let timer = if visible { ctx.contact.outgoing_timer() } else { None };
    let raw = encode_join(
        session.contact_group_id,
        &session.private_group_id,
        timestamp,
        session.last_local_message_id.as_ref(),
        timer,
    )?;
    store_outgoing(ctx, &raw, session.private_group_id, MessageType::Join, visible, timer, false)
}

/// Sends a leave. Visible leaves decline an invitation and carry the timer.
pub(crate) fn send_leave<S: State>(
    ctx: &EngineContext<'_>,
    session: &Session<S>,
    visible: bool,
    is_auto_decline: bool,
) -> Result<Sent> {
    if is_auto_decline && !visible {
        return Err(InvitationError::ProtocolState(
            "An automatic decline must be visible".to_string(),
        ));
    }
    let timestamp = next_timestamp(ctx, session)?;
    let timer = if visible { ctx.contact.outgoing_timer() } else { None };
    let raw = encode_leave(
        session.contact_group_id,
        &session.private_group_id,
        timestamp,
        session.last_local_message_id.as_ref(),
        timer,
    )?;
    store_outgoing(
        ctx,
        &raw,
        session.private_group_id,
        MessageType::Leave,
        visible,
        timer,
        is_auto_decline,
    )
}

pub(crate) fn send_abort<S: State>(ctx: &EngineContext<'_>, session: &Session<S>) -> Result<Sent> {
    let raw = encode_abort(
        session.contact_group_id,
        &session.private_group_id,
        next_timestamp(ctx, session)?,
    )?;
    store_outgoing(ctx, &raw, session.private_group_id, MessageType::Abort, false, None, false)
}

// ==================== Incoming ====================

/// Shows a received message in the conversation.
pub(crate) fn mark_visible_in_ui(ctx: &EngineContext<'_>, id: &MessageId) -> Result<()> {
    messages::set_visible_in_ui(ctx.conn, id, true)
}

/// Adopts the auto-delete timer carried by a visible incoming message.
///
/// A message carrying the field at all proves the contact's client
/// understands timers. Older messages never override a newer setting.
pub(crate) fn receive_auto_delete_timer(
    ctx: &mut EngineContext<'_>,
    timer: Option<i64>,
    timestamp: i64,
) -> Result<()> {
    let id = ctx.contact.id;
    if timer.is_some() && !ctx.contact.supports_auto_delete {
        contacts::set_supports_auto_delete(ctx.conn, id, true)?;
        ctx.contact.supports_auto_delete = true;
    }
    if !ctx.contact.supports_auto_delete {
        return Ok(());
    }
    if contacts::update_auto_delete_timer(ctx.conn, id, timer, timestamp)? {
        ctx.contact.auto_delete_timer = timer;
        ctx.contact.auto_delete_timer_updated = timestamp;
    }
    Ok(())
}

// ==================== Abort ====================

/// Moves a session to its error state after a protocol violation.
///
/// Hides the group from the contact if we are subscribed and tells the
/// contact we gave up. A session already in error is returned unchanged.
pub(crate) fn abort<S: State>(ctx: &EngineContext<'_>, session: Session<S>, reason: &str) -> Result<Session<S>> {
    if session.state == S::error() {
        return Ok(session);
    }
    set_visibility(ctx, &session, Visibility::Invisible)?;
    let sent = send_abort(ctx, &session)?;
    log::warn!(
        "Aborting {} session {}: {reason}",
        S::ROLE.as_str(),
        session.session_id().short()
    );
    Ok(Session {
        last_local_message_id: Some(sent.id),
        local_timestamp: sent.timestamp,
        state: S::error(),
        ..session
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{Fixture, NOW};
    use crate::session::{CreatorSession, CreatorState, PeerSession};
    use crate::storage::MessageFilter;

    #[test]
    fn dependency_must_match_last_remote() {
        let fx = Fixture::new(false);
        let mut s = PeerSession::new(fx.cg(), GroupId::from_bytes([3; 32]));
        assert!(valid_dependency(&s, None));
        assert!(!valid_dependency(&s, Some(&MessageId::from_bytes([1; 32]))));

        s.last_remote_message_id = Some(MessageId::from_bytes([1; 32]));
        assert!(valid_dependency(&s, Some(&MessageId::from_bytes([1; 32]))));
        assert!(!valid_dependency(&s, Some(&MessageId::from_bytes([2; 32]))));
        assert!(!valid_dependency(&s, None));
    }

    #[test]
    fn timestamps_follow_session_and_conversation() {
        let fx = Fixture::new(false);
        let group = fx.local_group();
        let mut s = CreatorSession::new(fx.cg(), *group.id());

        fx.with_ctx(|ctx| {
            assert_eq!(next_timestamp(ctx, &s)?, NOW);

            s.invite_timestamp = NOW + 50;
            assert_eq!(next_timestamp(ctx, &s)?, NOW + 51);

            // A message in the conversation from the future pushes ours later
            let raw = RawMessage::new(fx.cg(), NOW + 500, vec![1]);
            messages::insert_message(ctx.conn, &StoredMessage::incoming(&raw, *group.id(), MessageType::Join))?;
            assert_eq!(next_timestamp(ctx, &s)?, NOW + 501);
            Ok(())
        });
    }

    #[test]
    fn abort_never_reuses_received_abort_id() {
        let fx = Fixture::new(false);
        let group = fx.local_group();
        let s = CreatorSession::new(fx.cg(), *group.id()).with_state(CreatorState::Invited);

        // The contact's abort carries the same body ours will, at the same time.
        let theirs = encode_abort(fx.cg(), group.id(), NOW).unwrap();
        fx.with_ctx(|ctx| {
            messages::insert_message(ctx.conn, &StoredMessage::incoming(&theirs, *group.id(), MessageType::Abort))?;
            Ok(())
        });
        let aborted = fx.with_ctx(|ctx| abort(ctx, s, "test"));

        let ours = aborted.last_local_message_id.unwrap();
        assert_ne!(ours, theirs.id);
        assert_eq!(aborted.local_timestamp, NOW + 1);
        let sent = fx.with_ctx(|ctx| messages::list_messages(ctx.conn, &fx.cg(), &MessageFilter::new().local(true)));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, ours);
    }

    #[test]
    fn colliding_outgoing_message_is_an_error() {
        let fx = Fixture::new(false);
        let group = fx.local_group();
        let raw = encode_abort(fx.cg(), group.id(), NOW).unwrap();
        let result = fx.storage.transaction(|conn| {
            let ctx = EngineContext::new(conn, &fx.membership, &fx.clock, &fx.local, fx.contact.clone());
            messages::insert_message(conn, &StoredMessage::incoming(&raw, *group.id(), MessageType::Abort))?;
            store_outgoing(&ctx, &raw, *group.id(), MessageType::Abort, false, None, false)
        });
        assert!(matches!(result, Err(InvitationError::ProtocolState(_))));
    }

    #[test]
    fn visibility_only_applies_when_subscribed() {
        let fx = Fixture::new(false);
        let unsubscribed = fx.remote_group();
        let s = PeerSession::new(fx.cg(), *unsubscribed.id());
        fx.with_ctx(|ctx| {
            set_visibility(ctx, &s, Visibility::Shared)?;
            let v = ctx.membership.get_group_visibility(ctx.conn, ctx.contact.id, unsubscribed.id())?;
            assert_eq!(v, Visibility::Invisible);
            Ok(())
        });

        let subscribed = fx.local_group();
        let s = PeerSession::new(fx.cg(), *subscribed.id());
        fx.with_ctx(|ctx| {
            set_visibility(ctx, &s, Visibility::Shared)?;
            let v = ctx.membership.get_group_visibility(ctx.conn, ctx.contact.id, subscribed.id())?;
            assert_eq!(v, Visibility::Shared);
            Ok(())
        });
    }

    #[test]
    fn abort_is_idempotent() {
        let fx = Fixture::new(false);
        let group = fx.local_group();
        let s = CreatorSession::new(fx.cg(), *group.id()).with_state(CreatorState::Joined);

        let aborted = fx.with_ctx(|ctx| {
            set_visibility(ctx, &s, Visibility::Shared)?;
            abort(ctx, s, "test")
        });
        assert_eq!(aborted.state, CreatorState::Error);
        assert!(aborted.last_local_message_id.is_some());

        let again = fx.with_ctx(|ctx| abort(ctx, aborted, "test"));
        assert_eq!(again, aborted);

        fx.with_ctx(|ctx| {
            let sent = messages::list_messages(ctx.conn, &fx.cg(), &MessageFilter::new().local(true))?;
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].message_type, MessageType::Abort);
            let v = ctx.membership.get_group_visibility(ctx.conn, ctx.contact.id, group.id())?;
            assert_eq!(v, Visibility::Invisible);
            Ok(())
        });
    }

    #[test]
    fn auto_decline_leave_must_be_visible() {
        let fx = Fixture::new(false);
        let s = PeerSession::new(fx.cg(), GroupId::from_bytes([3; 32]));
        let result = fx.storage.transaction(|conn| {
            let ctx = EngineContext::new(conn, &fx.membership, &fx.clock, &fx.local, fx.contact.clone());
            send_leave(&ctx, &s, false, true)
        });
        assert!(matches!(result, Err(InvitationError::ProtocolState(_))));
    }

    #[test]
    fn incoming_timer_marks_support_and_moves_forward() {
        let fx = Fixture::new(false);
        fx.with_ctx(|ctx| {
            receive_auto_delete_timer(ctx, None, 10)?;
            assert!(!ctx.contact.supports_auto_delete);

            receive_auto_delete_timer(ctx, Some(120_000), 20)?;
            assert!(ctx.contact.supports_auto_delete);
            assert_eq!(ctx.contact.auto_delete_timer, Some(120_000));

            receive_auto_delete_timer(ctx, Some(60_000), 15)?;
            assert_eq!(ctx.contact.auto_delete_timer, Some(120_000));

            receive_auto_delete_timer(ctx, None, 30)?;
            assert_eq!(ctx.contact.auto_delete_timer, None);

            let stored = contacts::get_contact(ctx.conn, ctx.contact.id)?.unwrap();
            assert!(stored.supports_auto_delete);
            assert_eq!(stored.auto_delete_timer, None);
            Ok(())
        });
    }
}
