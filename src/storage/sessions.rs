//! Session records table.
//!
//! Sessions are addressed directly by `(contact_group_id, session_id)`.
//! Enumeration by contact or by private group is only used by the bulk
//! membership hooks and deletion.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::ids::{GroupId, SessionId};
use crate::session::{decode_session, encode_session, AnySession};

/// Loads the session stored for a contact group and session id.
///
/// # Errors
///
/// Returns an error if the database operation fails or the record is corrupt.
pub fn load_session(
    conn: &Connection,
    contact_group_id: &GroupId,
    session_id: &SessionId,
) -> Result<Option<AnySession>> {
    let record: Option<Vec<u8>> = conn
        .query_row(
            "SELECT record FROM sessions WHERE contact_group_id = ?1 AND session_id = ?2",
            params![contact_group_id.as_slice(), session_id.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    record
        .map(|bytes| decode_session(*contact_group_id, &bytes))
        .transpose()
        .map_err(Into::into)
}

/// Stores a session, replacing any previous record under the same key.
///
/// # Errors
///
/// Returns an error if encoding or the database operation fails.
pub fn store_session(conn: &Connection, session: &AnySession, now: i64) -> Result<()> {
    let record = encode_session(session)?;
    conn.execute(
        r"
        INSERT INTO sessions (contact_group_id, session_id, role, record, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(contact_group_id, session_id) DO UPDATE SET
            record = excluded.record,
            updated_at = excluded.updated_at
        ",
        params![
            session.contact_group_id().as_slice(),
            session.session_id().as_slice(),
            session.role().as_str(),
            &record,
            now,
        ],
    )?;
    Ok(())
}

/// Loads every session with one contact.
///
/// # Errors
///
/// Returns an error if the database operation fails or a record is corrupt.
pub fn sessions_for_contact(conn: &Connection, contact_group_id: &GroupId) -> Result<Vec<AnySession>> {
    let mut stmt =
        conn.prepare("SELECT record FROM sessions WHERE contact_group_id = ?1 ORDER BY session_id")?;
    let records = stmt
        .query_map(params![contact_group_id.as_slice()], |row| row.get::<_, Vec<u8>>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    records
        .iter()
        .map(|bytes| decode_session(*contact_group_id, bytes).map_err(Into::into))
        .collect()
}

/// Deletes every session with one contact.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_sessions_for_contact(conn: &Connection, contact_group_id: &GroupId) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE contact_group_id = ?1",
        params![contact_group_id.as_slice()],
    )?;
    Ok(())
}
