//! Picks the engine for a session and persists the result.
//!
//! Sessions are keyed by (contact group, session id) where the session id
//! is the private group id. The stored role decides which engine handles
//! the session; a message arriving for an unknown session may only open
//! one as an invitee (invite) or as a peer (join).

use crate::engine::{CreatorEngine, EngineContext, InviteeEngine, PeerEngine, ProtocolEngine};
use crate::error::{InvitationError, Result};
use crate::ids::{GroupId, SessionId};
use crate::session::{AnySession, InviteeSession, PeerSession, Session};
use crate::storage::sessions::{load_session, store_session};
use crate::wire::{MessageType, ProtocolMessage};

/// A local action applied to a session.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LocalAction<'a> {
    Invite {
        text: Option<&'a str>,
        timestamp: i64,
        signature: &'a [u8],
    },
    Join,
    Leave {
        is_auto_decline: bool,
    },
    MemberAdded,
}

fn apply<E: ProtocolEngine>(
    engine: &E,
    ctx: &mut EngineContext<'_>,
    session: Session<E::State>,
    action: LocalAction<'_>,
) -> Result<Session<E::State>> {
    match action {
        LocalAction::Invite {
            text,
            timestamp,
            signature,
        } => engine.on_invite_action(ctx, session, text, timestamp, signature),
        LocalAction::Join => engine.on_join_action(ctx, session),
        LocalAction::Leave { is_auto_decline } => engine.on_leave_action(ctx, session, is_auto_decline),
        LocalAction::MemberAdded => engine.on_member_added_action(ctx, session),
    }
}

/// Stores `next` and logs the transition from `previous`.
fn commit(ctx: &EngineContext<'_>, previous: &AnySession, next: AnySession) -> Result<AnySession> {
    store_session(ctx.conn, &next, ctx.clock.now_millis())?;
    if previous.state_value() != next.state_value() {
        log::debug!(
            "{} session {} with contact {}: {} -> {}",
            next.role().as_str(),
            next.session_id().short(),
            ctx.contact.id,
            previous.state_name(),
            next.state_name()
        );
    }
    Ok(next)
}

/// Loads the session with the context's contact about `private_group_id`.
///
/// # Errors
///
/// Returns an error if the database operation fails or the record is corrupt.
pub(crate) fn find_session(ctx: &EngineContext<'_>, private_group_id: &GroupId) -> Result<Option<AnySession>> {
    load_session(
        ctx.conn,
        &ctx.contact.contact_group_id,
        &SessionId::from(*private_group_id),
    )
}

/// Applies a local action to an existing session and stores the result.
///
/// # Errors
///
/// Returns an error if the action is invalid for the session's role or
/// state, or storage fails.
pub(crate) fn on_action(
    ctx: &mut EngineContext<'_>,
    session: AnySession,
    action: LocalAction<'_>,
) -> Result<AnySession> {
    let next: AnySession = match session {
        AnySession::Creator(s) => apply(&CreatorEngine, ctx, s, action)?.into(),
        AnySession::Invitee(s) => apply(&InviteeEngine, ctx, s, action)?.into(),
        AnySession::Peer(s) => apply(&PeerEngine, ctx, s, action)?.into(),
    };
    commit(ctx, &session, next)
}

/// Routes an incoming message to its session, creating one if the message
/// may open a session.
///
/// # Errors
///
/// Returns [`InvitationError::InvalidFirstMessage`] if no session exists and
/// the message cannot open one, or an error if storage fails.
pub(crate) fn on_message(ctx: &mut EngineContext<'_>, message: &ProtocolMessage) -> Result<AnySession> {
    let private_group_id = *message.private_group_id();
    let contact_group_id = ctx.contact.contact_group_id;
    let session = match find_session(ctx, &private_group_id)? {
        Some(session) => session,
        None => match message.message_type() {
            MessageType::Invite => InviteeSession::new(contact_group_id, private_group_id).into(),
            MessageType::Join => PeerSession::new(contact_group_id, private_group_id).into(),
            other => {
                return Err(InvitationError::InvalidFirstMessage(format!(
                    "{other:?} for unknown session {}",
                    private_group_id.short()
                )))
            }
        },
    };
    let next: AnySession = match session {
        AnySession::Creator(s) => CreatorEngine.on_message(ctx, s, message)?.into(),
        AnySession::Invitee(s) => InviteeEngine.on_message(ctx, s, message)?.into(),
        AnySession::Peer(s) => PeerEngine.on_message(ctx, s, message)?.into(),
    };
    commit(ctx, &session, next)
}
