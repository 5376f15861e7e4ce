//! Conversation message deletion.
//!
//! Messages are deleted a whole session at a time. A session's messages are
//! only removed when the session is not waiting for an answer, every one of
//! its messages has been delivered, and the selection covers all of its
//! messages shown in the conversation.
//!
//! Session records are kept. A deleted peer session would let a replayed
//! join open a fresh one, and a deleted creator or invitee session would
//! let a replayed invitation be answered again.

use std::collections::{BTreeMap, HashSet};

use rusqlite::Connection;

use super::types::DeletionResult;
use crate::error::Result;
use crate::ids::{GroupId, MessageId, SessionId};
use crate::storage::messages::{delete_message, list_messages};
use crate::storage::sessions::load_session;
use crate::storage::{Contact, MessageFilter, StoredMessage};

/// Which messages of a conversation the user asked to delete.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selection<'a> {
    All,
    Only(&'a [MessageId]),
}

/// Ids of the messages shown in the conversation with `contact`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub(crate) fn visible_message_ids(conn: &Connection, contact: &Contact) -> Result<Vec<MessageId>> {
    let messages = list_messages(conn, &contact.contact_group_id, &MessageFilter::new().visible())?;
    Ok(messages.into_iter().map(|m| m.id).collect())
}

/// Deletes the selected messages of a conversation, session by session.
///
/// Ids that do not belong to the conversation are ignored.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub(crate) fn delete_messages(
    conn: &Connection,
    contact: &Contact,
    selection: Selection<'_>,
) -> Result<DeletionResult> {
    let all = list_messages(conn, &contact.contact_group_id, &MessageFilter::new())?;
    let selected: HashSet<MessageId> = match selection {
        Selection::All => all.iter().map(|m| m.id).collect(),
        Selection::Only(ids) => ids.iter().copied().collect(),
    };

    // Every session with a selected message takes part with all of its
    // messages, shown or not.
    let touched: HashSet<GroupId> = all
        .iter()
        .filter(|m| selected.contains(&m.id))
        .map(|m| m.private_group_id)
        .collect();
    let mut by_session: BTreeMap<GroupId, Vec<&StoredMessage>> = BTreeMap::new();
    for message in all.iter().filter(|m| touched.contains(&m.private_group_id)) {
        by_session.entry(message.private_group_id).or_default().push(message);
    }

    let mut result = DeletionResult::default();
    for (private_group_id, messages) in by_session {
        result.add(delete_session_messages(
            conn,
            contact,
            &private_group_id,
            &messages,
            &selected,
        )?);
    }
    Ok(result)
}

fn delete_session_messages(
    conn: &Connection,
    contact: &Contact,
    private_group_id: &GroupId,
    messages: &[&StoredMessage],
    selected: &HashSet<MessageId>,
) -> Result<DeletionResult> {
    let mut result = DeletionResult::default();

    let session = load_session(conn, &contact.contact_group_id, &SessionId::from(*private_group_id))?;
    if session.as_ref().is_some_and(|s| s.is_awaiting_response()) {
        log::info!(
            "Not deleting messages of session {}: awaiting response",
            private_group_id.short()
        );
        result.in_progress = true;
        return Ok(result);
    }

    if messages.iter().any(|m| !m.acked) {
        result.in_progress = true;
    }
    // Protocol-only messages cannot be selected in the conversation.
    if messages
        .iter()
        .any(|m| m.visible_in_ui && !selected.contains(&m.id))
    {
        result.not_all_selected = true;
    }
    if !result.all_deleted() {
        log::info!(
            "Not deleting messages of session {}: in progress {}, partly selected {}",
            private_group_id.short(),
            result.in_progress,
            result.not_all_selected
        );
        return Ok(result);
    }

    for message in messages {
        delete_message(conn, &message.id)?;
    }
    result.deleted = messages.len();
    log::debug!(
        "Deleted {} messages of session {} with contact {}",
        result.deleted,
        private_group_id.short(),
        contact.id
    );
    Ok(result)
}
