//! Contacts table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::blob_to_id;
use super::types::Contact;
use crate::error::{InvitationError, Result};
use crate::identity::Author;
use crate::ids::{AuthorId, ContactId, GroupId};

const CONTACT_COLUMNS: &str = "contact_id, format_version, author_name, public_key, \
     contact_group_id, supports_auto_delete, auto_delete_timer, auto_delete_timer_updated, created_at";

struct ContactRow {
    id: i64,
    format_version: u8,
    author_name: String,
    public_key: Vec<u8>,
    contact_group_id: Vec<u8>,
    supports_auto_delete: bool,
    auto_delete_timer: Option<i64>,
    auto_delete_timer_updated: i64,
    created_at: i64,
}

impl ContactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            format_version: row.get(1)?,
            author_name: row.get(2)?,
            public_key: row.get(3)?,
            contact_group_id: row.get(4)?,
            supports_auto_delete: row.get(5)?,
            auto_delete_timer: row.get(6)?,
            auto_delete_timer_updated: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_contact(self) -> Result<Contact> {
        let public_key: [u8; 32] = self
            .public_key
            .try_into()
            .map_err(|_| InvitationError::InvalidData("Invalid public_key length".to_string()))?;
        let author = Author::with_format_version(self.format_version, self.author_name, public_key)?;
        Ok(Contact {
            id: ContactId(self.id),
            author,
            contact_group_id: blob_to_id(&self.contact_group_id, GroupId::from_slice, "contact_group_id")?,
            supports_auto_delete: self.supports_auto_delete,
            auto_delete_timer: self.auto_delete_timer,
            auto_delete_timer_updated: self.auto_delete_timer_updated,
            created_at: self.created_at,
        })
    }
}

/// Inserts a contact and returns it with its assigned id.
///
/// # Errors
///
/// Returns an error if a contact with the same author or contact group
/// already exists, or the database operation fails.
pub fn insert_contact(
    conn: &Connection,
    author: &Author,
    contact_group_id: GroupId,
    supports_auto_delete: bool,
    auto_delete_timer: Option<i64>,
    created_at: i64,
) -> Result<Contact> {
    conn.execute(
        r"
        INSERT INTO contacts (
            author_id, format_version, author_name, public_key, contact_group_id,
            supports_auto_delete, auto_delete_timer, auto_delete_timer_updated, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
        ",
        params![
            author.id().as_slice(),
            author.format_version(),
            author.name(),
            author.public_key().as_slice(),
            contact_group_id.as_slice(),
            supports_auto_delete,
            auto_delete_timer,
            created_at,
        ],
    )?;
    Ok(Contact {
        id: ContactId(conn.last_insert_rowid()),
        author: author.clone(),
        contact_group_id,
        supports_auto_delete,
        auto_delete_timer,
        auto_delete_timer_updated: 0,
        created_at,
    })
}

/// Retrieves a contact by id.
///
/// # Errors
///
/// Returns an error if the database operation fails or the row is corrupt.
pub fn get_contact(conn: &Connection, id: ContactId) -> Result<Option<Contact>> {
    let row = conn
        .query_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE contact_id = ?1"),
            params![id.0],
            ContactRow::from_row,
        )
        .optional()?;
    row.map(ContactRow::into_contact).transpose()
}

/// Retrieves the contact owning a contact group.
///
/// # Errors
///
/// Returns an error if the database operation fails or the row is corrupt.
pub fn get_contact_by_group(conn: &Connection, contact_group_id: &GroupId) -> Result<Option<Contact>> {
    let row = conn
        .query_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE contact_group_id = ?1"),
            params![contact_group_id.as_slice()],
            ContactRow::from_row,
        )
        .optional()?;
    row.map(ContactRow::into_contact).transpose()
}

/// Retrieves the contacts whose author is `author_id`.
///
/// # Errors
///
/// Returns an error if the database operation fails or a row is corrupt.
pub fn get_contacts_by_author(conn: &Connection, author_id: &AuthorId) -> Result<Vec<Contact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts WHERE author_id = ?1 ORDER BY contact_id"
    ))?;
    let rows = stmt
        .query_map(params![author_id.as_slice()], ContactRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ContactRow::into_contact).collect()
}

/// Retrieves all contacts in insertion order.
///
/// # Errors
///
/// Returns an error if the database operation fails or a row is corrupt.
pub fn get_contacts(conn: &Connection) -> Result<Vec<Contact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY contact_id"
    ))?;
    let rows = stmt
        .query_map([], ContactRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ContactRow::into_contact).collect()
}

/// Records a newer auto-delete timer for the contact.
///
/// Ignored unless `timestamp` is newer than the last recorded change, so an
/// old message arriving late cannot roll the timer back.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn update_auto_delete_timer(
    conn: &Connection,
    id: ContactId,
    timer: Option<i64>,
    timestamp: i64,
) -> Result<bool> {
    let changed = conn.execute(
        r"
        UPDATE contacts SET auto_delete_timer = ?1, auto_delete_timer_updated = ?2
        WHERE contact_id = ?3 AND auto_delete_timer_updated < ?2
        ",
        params![timer, timestamp, id.0],
    )?;
    Ok(changed == 1)
}

/// Records whether the contact's client supports auto-delete timers.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn set_supports_auto_delete(conn: &Connection, id: ContactId, supported: bool) -> Result<()> {
    conn.execute(
        "UPDATE contacts SET supports_auto_delete = ?1 WHERE contact_id = ?2",
        params![supported, id.0],
    )?;
    Ok(())
}

/// Deletes a contact.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_contact(conn: &Connection, id: ContactId) -> Result<()> {
    conn.execute("DELETE FROM contacts WHERE contact_id = ?1", params![id.0])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InvitationStorage;

    fn author(n: u8) -> Author {
        Author::new(format!("author{n}"), [n; 32]).unwrap()
    }

    #[test]
    fn insert_and_get() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let cg = GroupId::from_bytes([5; 32]);
                let contact = insert_contact(conn, &author(1), cg, true, Some(60_000), 10)?;
                assert_eq!(get_contact(conn, contact.id)?, Some(contact.clone()));
                assert_eq!(get_contact_by_group(conn, &cg)?, Some(contact.clone()));
                assert_eq!(get_contacts_by_author(conn, author(1).id())?, vec![contact]);
                assert!(get_contact(conn, ContactId(99))?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn duplicate_author_rejected() {
        let storage = InvitationStorage::in_memory().unwrap();
        let result = storage.transaction(|conn| {
            insert_contact(conn, &author(1), GroupId::from_bytes([5; 32]), false, None, 0)?;
            insert_contact(conn, &author(1), GroupId::from_bytes([6; 32]), false, None, 0)?;
            Ok(())
        });
        assert!(matches!(result, Err(InvitationError::Database(_))));
    }

    #[test]
    fn timer_updates_only_move_forward() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let c = insert_contact(conn, &author(1), GroupId::from_bytes([5; 32]), true, None, 0)?;
                assert!(update_auto_delete_timer(conn, c.id, Some(120_000), 100)?);
                assert!(!update_auto_delete_timer(conn, c.id, Some(60_000), 50)?);
                let stored = get_contact(conn, c.id)?.unwrap();
                assert_eq!(stored.auto_delete_timer, Some(120_000));
                assert_eq!(stored.auto_delete_timer_updated, 100);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn delete_removes_contact() {
        let storage = InvitationStorage::in_memory().unwrap();
        storage
            .transaction(|conn| {
                let c = insert_contact(conn, &author(2), GroupId::from_bytes([5; 32]), false, None, 0)?;
                delete_contact(conn, c.id)?;
                assert!(get_contacts(conn)?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}
