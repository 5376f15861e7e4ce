//! `SQLite` implementation of [`GroupMembership`].

use rusqlite::{params, Connection, OptionalExtension};

use super::GroupMembership;
use crate::error::{InvitationError, Result};
use crate::identity::Author;
use crate::ids::{AuthorId, ContactId, GroupId};
use crate::session::Visibility;
use crate::wire::PrivateGroup;

/// Group membership stored alongside the invitation tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteGroupMembership;

impl SqliteGroupMembership {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns who revealed our relationship with a member, if anyone did.
    ///
    /// `Some(true)` means the contact revealed it, `Some(false)` means we did.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn revealed_by_contact(
        &self,
        conn: &Connection,
        private_group_id: &GroupId,
        author_id: &AuthorId,
    ) -> Result<Option<bool>> {
        let revealed: Option<Option<bool>> = conn
            .query_row(
                "SELECT revealed_by_contact FROM group_members WHERE group_id = ?1 AND author_id = ?2",
                params![private_group_id.as_slice(), author_id.as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(revealed.flatten())
    }
}

fn row_to_group(
    name: String,
    format_version: u8,
    creator_name: String,
    public_key: &[u8],
    salt: &[u8],
) -> Result<PrivateGroup> {
    let public_key: [u8; 32] = public_key
        .try_into()
        .map_err(|_| InvitationError::InvalidData("Invalid creator public_key length".to_string()))?;
    let salt: [u8; 32] = salt
        .try_into()
        .map_err(|_| InvitationError::InvalidData("Invalid salt length".to_string()))?;
    let creator = Author::with_format_version(format_version, creator_name, public_key)?;
    Ok(PrivateGroup::new(name, creator, salt)?)
}

impl GroupMembership for SqliteGroupMembership {
    fn initialize_schema(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r"
            -- Subscribed private groups
            CREATE TABLE IF NOT EXISTS private_groups (
                group_id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                creator_format_version INTEGER NOT NULL,
                creator_name TEXT NOT NULL,
                creator_public_key BLOB NOT NULL,
                salt BLOB NOT NULL,
                dissolved INTEGER NOT NULL DEFAULT 0,
                joined_at INTEGER NOT NULL
            );

            -- Known members of subscribed groups
            CREATE TABLE IF NOT EXISTS group_members (
                group_id BLOB NOT NULL,
                author_id BLOB NOT NULL,
                format_version INTEGER NOT NULL,
                name TEXT NOT NULL,
                public_key BLOB NOT NULL,
                revealed_by_contact INTEGER,
                PRIMARY KEY (group_id, author_id)
            );

            -- Per-contact exposure of each group
            CREATE TABLE IF NOT EXISTS group_visibility (
                group_id BLOB NOT NULL,
                contact_id INTEGER NOT NULL,
                visibility TEXT NOT NULL,
                PRIMARY KEY (group_id, contact_id)
            );
            ",
        )?;
        Ok(())
    }

    fn add_private_group(&self, conn: &Connection, group: &PrivateGroup, joined_at: i64) -> Result<()> {
        let creator = group.creator();
        conn.execute(
            r"
            INSERT OR IGNORE INTO private_groups (
                group_id, name, creator_format_version, creator_name, creator_public_key, salt, joined_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                group.id().as_slice(),
                group.name(),
                creator.format_version(),
                creator.name(),
                creator.public_key().as_slice(),
                group.salt().as_slice(),
                joined_at,
            ],
        )?;
        self.add_member(conn, group.id(), creator)
    }

    fn remove_private_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<()> {
        for table in ["group_visibility", "group_members", "private_groups"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE group_id = ?1"),
                params![private_group_id.as_slice()],
            )?;
        }
        Ok(())
    }

    fn contains_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM private_groups WHERE group_id = ?1",
                params![private_group_id.as_slice()],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn get_private_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<Option<PrivateGroup>> {
        let row = conn
            .query_row(
                r"
                SELECT name, creator_format_version, creator_name, creator_public_key, salt
                FROM private_groups WHERE group_id = ?1
                ",
                params![private_group_id.as_slice()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u8>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(name, version, creator_name, public_key, salt)| {
            row_to_group(name, version, creator_name, &public_key, &salt)
        })
        .transpose()
    }

    fn private_groups(&self, conn: &Connection) -> Result<Vec<PrivateGroup>> {
        let mut stmt = conn.prepare(
            r"
            SELECT name, creator_format_version, creator_name, creator_public_key, salt
            FROM private_groups ORDER BY joined_at, group_id
            ",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(name, version, creator_name, public_key, salt)| {
                row_to_group(name, version, creator_name, &public_key, &salt)
            })
            .collect()
    }

    fn mark_group_dissolved(&self, conn: &Connection, private_group_id: &GroupId) -> Result<()> {
        conn.execute(
            "UPDATE private_groups SET dissolved = 1 WHERE group_id = ?1",
            params![private_group_id.as_slice()],
        )?;
        Ok(())
    }

    fn is_dissolved(&self, conn: &Connection, private_group_id: &GroupId) -> Result<bool> {
        let dissolved: Option<bool> = conn
            .query_row(
                "SELECT dissolved FROM private_groups WHERE group_id = ?1",
                params![private_group_id.as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dissolved.unwrap_or(false))
    }

    fn add_member(&self, conn: &Connection, private_group_id: &GroupId, member: &Author) -> Result<()> {
        conn.execute(
            r"
            INSERT OR IGNORE INTO group_members (group_id, author_id, format_version, name, public_key)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                private_group_id.as_slice(),
                member.id().as_slice(),
                member.format_version(),
                member.name(),
                member.public_key().as_slice(),
            ],
        )?;
        Ok(())
    }

    fn is_member(&self, conn: &Connection, private_group_id: &GroupId, author_id: &AuthorId) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM group_members WHERE group_id = ?1 AND author_id = ?2",
                params![private_group_id.as_slice(), author_id.as_slice()],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn relationship_revealed(
        &self,
        conn: &Connection,
        private_group_id: &GroupId,
        author_id: &AuthorId,
        by_contact: bool,
    ) -> Result<()> {
        conn.execute(
            r"
            UPDATE group_members SET revealed_by_contact = ?1
            WHERE group_id = ?2 AND author_id = ?3 AND revealed_by_contact IS NULL
            ",
            params![by_contact, private_group_id.as_slice(), author_id.as_slice()],
        )?;
        Ok(())
    }

    fn set_group_visibility(
        &self,
        conn: &Connection,
        contact_id: ContactId,
        private_group_id: &GroupId,
        visibility: Visibility,
    ) -> Result<()> {
        conn.execute(
            r"
            INSERT INTO group_visibility (group_id, contact_id, visibility)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(group_id, contact_id) DO UPDATE SET visibility = excluded.visibility
            ",
            params![private_group_id.as_slice(), contact_id.0, visibility.as_str()],
        )?;
        Ok(())
    }

    fn get_group_visibility(
        &self,
        conn: &Connection,
        contact_id: ContactId,
        private_group_id: &GroupId,
    ) -> Result<Visibility> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT visibility FROM group_visibility WHERE group_id = ?1 AND contact_id = ?2",
                params![private_group_id.as_slice(), contact_id.0],
                |row| row.get(0),
            )
            .optional()?;
        stored.map_or(Ok(Visibility::Invisible), |s| {
            Visibility::parse(&s)
                .ok_or_else(|| InvitationError::InvalidData(format!("Invalid visibility: {s}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InvitationStorage;

    fn setup() -> (InvitationStorage, SqliteGroupMembership, PrivateGroup) {
        let storage = InvitationStorage::in_memory().unwrap();
        let membership = SqliteGroupMembership::new();
        storage.transaction(|conn| membership.initialize_schema(conn)).unwrap();
        let creator = Author::new("carol", [3; 32]).unwrap();
        let group = PrivateGroup::new("choir", creator, [4; 32]).unwrap();
        (storage, membership, group)
    }

    #[test]
    fn add_and_get_group() {
        let (storage, membership, group) = setup();
        storage
            .transaction(|conn| {
                assert!(!membership.contains_group(conn, group.id())?);
                membership.add_private_group(conn, &group, 10)?;
                assert!(membership.contains_group(conn, group.id())?);
                assert_eq!(membership.get_private_group(conn, group.id())?, Some(group.clone()));
                assert_eq!(membership.private_groups(conn)?, vec![group.clone()]);
                assert!(membership.is_member(conn, group.id(), group.creator().id())?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn visibility_defaults_to_invisible() {
        let (storage, membership, group) = setup();
        storage
            .transaction(|conn| {
                let contact = ContactId(1);
                assert_eq!(
                    membership.get_group_visibility(conn, contact, group.id())?,
                    Visibility::Invisible
                );
                membership.set_group_visibility(conn, contact, group.id(), Visibility::Shared)?;
                assert_eq!(
                    membership.get_group_visibility(conn, contact, group.id())?,
                    Visibility::Shared
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn reveal_is_recorded_once() {
        let (storage, membership, group) = setup();
        storage
            .transaction(|conn| {
                let member = Author::new("pat", [6; 32]).unwrap();
                membership.add_private_group(conn, &group, 0)?;
                membership.add_member(conn, group.id(), &member)?;
                assert_eq!(membership.revealed_by_contact(conn, group.id(), member.id())?, None);
                membership.relationship_revealed(conn, group.id(), member.id(), true)?;
                membership.relationship_revealed(conn, group.id(), member.id(), false)?;
                assert_eq!(
                    membership.revealed_by_contact(conn, group.id(), member.id())?,
                    Some(true)
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn remove_and_dissolve() {
        let (storage, membership, group) = setup();
        storage
            .transaction(|conn| {
                membership.add_private_group(conn, &group, 0)?;
                assert!(!membership.is_dissolved(conn, group.id())?);
                membership.mark_group_dissolved(conn, group.id())?;
                assert!(membership.is_dissolved(conn, group.id())?);
                membership.remove_private_group(conn, group.id())?;
                assert!(!membership.contains_group(conn, group.id())?);
                assert!(!membership.is_member(conn, group.id(), group.creator().id())?);
                Ok(())
            })
            .unwrap();
    }
}
