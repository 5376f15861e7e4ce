//! Message metadata table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::blob_to_id;
use super::types::{MessageFilter, StoredMessage};
use crate::error::{InvitationError, Result};
use crate::ids::{GroupId, MessageId};
use crate::wire::MessageType;

const MESSAGE_COLUMNS: &str = "message_id, contact_group_id, private_group_id, message_type, \
     timestamp, body, local, read, visible_in_ui, available_to_answer, accepted, \
     auto_delete_timer, is_auto_decline, acked, timer_started_at";

struct MessageRow {
    id: Vec<u8>,
    contact_group_id: Vec<u8>,
    private_group_id: Vec<u8>,
    message_type: i64,
    timestamp: i64,
    body: Vec<u8>,
    local: bool,
    read: bool,
    visible_in_ui: bool,
    available_to_answer: bool,
    accepted: bool,
    auto_delete_timer: Option<i64>,
    is_auto_decline: bool,
    acked: bool,
    timer_started_at: Option<i64>,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_group_id: row.get(1)?,
            private_group_id: row.get(2)?,
            message_type: row.get(3)?,
            timestamp: row.get(4)?,
            body: row.get(5)?,
            local: row.get(6)?,
            read: row.get(7)?,
            visible_in_ui: row.get(8)?,
            available_to_answer: row.get(9)?,
            accepted: row.get(10)?,
            auto_delete_timer: row.get(11)?,
            is_auto_decline: row.get(12)?,
            acked: row.get(13)?,
            timer_started_at: row.get(14)?,
        })
    }

    fn into_message(self) -> Result<StoredMessage> {
        let message_type = MessageType::from_tag(i128::from(self.message_type)).ok_or_else(|| {
            InvitationError::InvalidData(format!("Invalid message_type: {}", self.message_type))
        })?;
        Ok(StoredMessage {
            id: blob_to_id(&self.id, MessageId::from_slice, "message_id")?,
            contact_group_id: blob_to_id(&self.contact_group_id, GroupId::from_slice, "contact_group_id")?,
            private_group_id: blob_to_id(&self.private_group_id, GroupId::from_slice, "private_group_id")?,
            message_type,
            timestamp: self.timestamp,
            body: self.body,
            local: self.local,
            read: self.read,
            visible_in_ui: self.visible_in_ui,
            available_to_answer: self.available_to_answer,
            accepted: self.accepted,
            auto_delete_timer: self.auto_delete_timer,
            is_auto_decline: self.is_auto_decline,
            acked: self.acked,
            timer_started_at: self.timer_started_at,
        })
    }
}

// ==================== Insert / Read ====================

/// Stores a message. Returns `false` if a message with the same id exists.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_message(conn: &Connection, message: &StoredMessage) -> Result<bool> {
    let changed = conn.execute(
        r"
        INSERT OR IGNORE INTO messages (
            message_id, contact_group_id, private_group_id, message_type, timestamp, body,
            local, read, visible_in_ui, available_to_answer, accepted, auto_delete_timer,
            is_auto_decline, acked, timer_started_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ",
        params![
            message.id.as_slice(),
            message.contact_group_id.as_slice(),
            message.private_group_id.as_slice(),
            message.message_type.tag(),
            message.timestamp,
            &message.body,
            message.local,
            message.read,
            message.visible_in_ui,
            message.available_to_answer,
            message.accepted,
            message.auto_delete_timer,
            message.is_auto_decline,
            message.acked,
            message.timer_started_at,
        ],
    )?;
    Ok(changed == 1)
}

/// Records that the contact sent a message identical to one of ours.
///
/// Returns `false` if there is no such local message or the copy was
/// already recorded.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_received_copy(conn: &Connection, id: &MessageId) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE messages SET received_copy = 1 WHERE message_id = ?1 AND local = 1 AND received_copy = 0",
        params![id.as_slice()],
    )?;
    Ok(changed == 1)
}

/// Retrieves a message by id.
///
/// # Errors
///
/// Returns an error if the database operation fails or the row is corrupt.
pub fn get_message(conn: &Connection, id: &MessageId) -> Result<Option<StoredMessage>> {
    let row = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
            params![id.as_slice()],
            MessageRow::from_row,
        )
        .optional()?;
    row.map(MessageRow::into_message).transpose()
}

/// Lists messages of a contact group matching `filter`, oldest first.
///
/// # Errors
///
/// Returns an error if the database operation fails or a row is corrupt.
pub fn list_messages(
    conn: &Connection,
    contact_group_id: &GroupId,
    filter: &MessageFilter,
) -> Result<Vec<StoredMessage>> {
    let mut stmt = conn.prepare(&format!(
        r"
        SELECT {MESSAGE_COLUMNS} FROM messages
        WHERE contact_group_id = ?1
          AND (?2 IS NULL OR private_group_id = ?2)
          AND (?3 IS NULL OR visible_in_ui = ?3)
          AND (?4 IS NULL OR available_to_answer = ?4)
          AND (?5 IS NULL OR local = ?5)
          AND (?6 IS NULL OR acked = ?6)
        ORDER BY timestamp ASC, rowid ASC
        "
    ))?;
    let rows = stmt
        .query_map(
            params![
                contact_group_id.as_slice(),
                filter.private_group_id.as_ref().map(GroupId::as_slice),
                filter.visible_in_ui,
                filter.available_to_answer,
                filter.local,
                filter.acked,
            ],
            MessageRow::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(MessageRow::into_message).collect()
}

/// Latest timestamp of any message in the contact group.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn latest_timestamp(conn: &Connection, contact_group_id: &GroupId) -> Result<Option<i64>> {
    Ok(conn.query_row(
        "SELECT MAX(timestamp) FROM messages WHERE contact_group_id = ?1",
        params![contact_group_id.as_slice()],
        |row| row.get(0),
    )?)
}

/// Messages whose auto-delete countdown has run out by `now`.
///
/// # Errors
///
/// Returns an error if the database operation fails or a row is corrupt.
pub fn expired_messages(conn: &Connection, now: i64) -> Result<Vec<StoredMessage>> {
    let mut stmt = conn.prepare(&format!(
        r"
        SELECT {MESSAGE_COLUMNS} FROM messages
        WHERE auto_delete_timer IS NOT NULL
          AND timer_started_at IS NOT NULL
          AND timer_started_at + auto_delete_timer <= ?1
        ORDER BY timestamp ASC
        "
    ))?;
    let rows = stmt
        .query_map(params![now], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(MessageRow::into_message).collect()
}

// ==================== Flag Updates ====================

fn update_flag(conn: &Connection, column: &str, id: &MessageId, value: bool) -> Result<()> {
    let changed = conn.execute(
        &format!("UPDATE messages SET {column} = ?1 WHERE message_id = ?2"),
        params![value, id.as_slice()],
    )?;
    if changed == 0 {
        return Err(InvitationError::InvalidData(format!(
            "No message {} to update",
            id.short()
        )));
    }
    Ok(())
}

/// Shows or hides a message in the conversation.
///
/// # Errors
///
/// Returns an error if the message does not exist or the update fails.
pub fn set_visible_in_ui(conn: &Connection, id: &MessageId, visible: bool) -> Result<()> {
    update_flag(conn, "visible_in_ui", id, visible)
}

/// Marks whether an invitation can still be answered.
///
/// # Errors
///
/// Returns an error if the message does not exist or the update fails.
pub fn set_available_to_answer(conn: &Connection, id: &MessageId, available: bool) -> Result<()> {
    update_flag(conn, "available_to_answer", id, available)
}

/// Marks an invitation as accepted.
///
/// # Errors
///
/// Returns an error if the message does not exist or the update fails.
pub fn set_accepted(conn: &Connection, id: &MessageId) -> Result<()> {
    update_flag(conn, "accepted", id, true)
}

/// Flags a message as an automatic decline.
///
/// # Errors
///
/// Returns an error if the message does not exist or the update fails.
pub fn set_auto_decline(conn: &Connection, id: &MessageId) -> Result<()> {
    update_flag(conn, "is_auto_decline", id, true)
}

/// Records the auto-delete timer a message was sent or received with.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn set_auto_delete_timer(conn: &Connection, id: &MessageId, timer: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE messages SET auto_delete_timer = ?1 WHERE message_id = ?2",
        params![timer, id.as_slice()],
    )?;
    Ok(())
}

/// Makes every received invitation in a session unanswerable.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_invites_unavailable(
    conn: &Connection,
    contact_group_id: &GroupId,
    private_group_id: &GroupId,
) -> Result<()> {
    conn.execute(
        r"
        UPDATE messages SET available_to_answer = 0
        WHERE contact_group_id = ?1 AND private_group_id = ?2
          AND message_type = ?3 AND local = 0
        ",
        params![
            contact_group_id.as_slice(),
            private_group_id.as_slice(),
            MessageType::Invite.tag(),
        ],
    )?;
    Ok(())
}

/// Marks a received message read, starting its auto-delete countdown.
///
/// Returns `false` if no such message exists.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_read(conn: &Connection, id: &MessageId, now: i64) -> Result<bool> {
    let changed = conn.execute(
        r"
        UPDATE messages SET
            read = 1,
            timer_started_at = CASE
                WHEN auto_delete_timer IS NOT NULL AND local = 0 AND timer_started_at IS NULL
                THEN ?1 ELSE timer_started_at END
        WHERE message_id = ?2
        ",
        params![now, id.as_slice()],
    )?;
    Ok(changed == 1)
}

/// Marks a sent message acknowledged, starting its auto-delete countdown.
///
/// Returns `false` if no such message exists.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_acked(conn: &Connection, id: &MessageId, now: i64) -> Result<bool> {
    let changed = conn.execute(
        r"
        UPDATE messages SET
            acked = 1,
            timer_started_at = CASE
                WHEN auto_delete_timer IS NOT NULL AND local = 1 AND timer_started_at IS NULL
                THEN ?1 ELSE timer_started_at END
        WHERE message_id = ?2
        ",
        params![now, id.as_slice()],
    )?;
    Ok(changed == 1)
}

// ==================== Deletion ====================

/// Deletes one message.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_message(conn: &Connection, id: &MessageId) -> Result<()> {
    conn.execute(
        "DELETE FROM messages WHERE message_id = ?1",
        params![id.as_slice()],
    )?;
    Ok(())
}

/// Deletes every message of a contact group.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_contact_messages(conn: &Connection, contact_group_id: &GroupId) -> Result<()> {
    conn.execute(
        "DELETE FROM messages WHERE contact_group_id = ?1",
        params![contact_group_id.as_slice()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InvitationStorage;
    use crate::wire::RawMessage;

    fn cg() -> GroupId {
        GroupId::from_bytes([1; 32])
    }

    fn pg() -> GroupId {
        GroupId::from_bytes([2; 32])
    }

    fn message(ts: i64, message_type: MessageType, local: bool) -> StoredMessage {
        let raw = RawMessage::new(cg(), ts, vec![message_type.tag()]);
        if local {
            StoredMessage::outgoing(&raw, pg(), message_type)
        } else {
            StoredMessage::incoming(&raw, pg(), message_type)
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let m = message(1, MessageType::Join, false);
                assert!(insert_message(conn, &m)?);
                assert!(!insert_message(conn, &m)?);
                assert_eq!(get_message(conn, &m.id)?, Some(m));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn list_applies_filter_and_orders() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let mut later = message(20, MessageType::Invite, false);
                later.visible_in_ui = true;
                later.available_to_answer = true;
                let earlier = message(10, MessageType::Join, true);
                insert_message(conn, &later)?;
                insert_message(conn, &earlier)?;

                let all = list_messages(conn, &cg(), &MessageFilter::new())?;
                assert_eq!(all.iter().map(|m| m.timestamp).collect::<Vec<_>>(), [10, 20]);

                let visible = list_messages(conn, &cg(), &MessageFilter::new().visible())?;
                assert_eq!(visible.len(), 1);
                assert_eq!(visible[0].id, later.id);

                let unacked = list_messages(conn, &cg(), &MessageFilter::new().unacked())?;
                assert_eq!(unacked.len(), 1);
                assert_eq!(unacked[0].id, earlier.id);

                let other = list_messages(
                    conn,
                    &cg(),
                    &MessageFilter::new().in_group(GroupId::from_bytes([9; 32])),
                )?;
                assert!(other.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn invites_become_unavailable() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let mut invite = message(1, MessageType::Invite, false);
                invite.available_to_answer = true;
                insert_message(conn, &invite)?;
                mark_invites_unavailable(conn, &cg(), &pg())?;
                let stored = get_message(conn, &invite.id)?.unwrap();
                assert!(!stored.available_to_answer);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn read_and_ack_start_timers() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let mut incoming = message(1, MessageType::Invite, false);
                incoming.auto_delete_timer = Some(60_000);
                let mut outgoing = message(2, MessageType::Join, true);
                outgoing.auto_delete_timer = Some(60_000);
                insert_message(conn, &incoming)?;
                insert_message(conn, &outgoing)?;

                assert!(mark_read(conn, &incoming.id, 1_000)?);
                assert!(mark_acked(conn, &outgoing.id, 2_000)?);
                assert!(expired_messages(conn, 60_999)?.is_empty());
                let expired = expired_messages(conn, 61_000)?;
                assert_eq!(expired.len(), 1);
                assert_eq!(expired[0].id, incoming.id);
                assert_eq!(expired_messages(conn, 62_000)?.len(), 2);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn update_missing_message_fails() {
        let storage = InvitationStorage::in_memory().unwrap();
        let result = storage.transaction(|conn| {
            set_visible_in_ui(conn, &MessageId::from_bytes([7; 32]), true)
        });
        assert!(matches!(result, Err(InvitationError::InvalidData(_))));
    }

    #[test]
    fn latest_timestamp_per_contact() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                assert_eq!(latest_timestamp(conn, &cg())?, None);
                insert_message(conn, &message(5, MessageType::Join, true))?;
                insert_message(conn, &message(9, MessageType::Leave, false))?;
                assert_eq!(latest_timestamp(conn, &cg())?, Some(9));
                delete_contact_messages(conn, &cg())?;
                assert_eq!(latest_timestamp(conn, &cg())?, None);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn received_copy_is_recorded_once_for_local_messages() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let ours = message(3, MessageType::Join, true);
                let theirs = message(4, MessageType::Join, false);
                insert_message(conn, &ours)?;
                insert_message(conn, &theirs)?;
                assert!(mark_received_copy(conn, &ours.id)?);
                assert!(!mark_received_copy(conn, &ours.id)?);
                assert!(!mark_received_copy(conn, &theirs.id)?);
                Ok(())
            })
            .unwrap();
    }
}
