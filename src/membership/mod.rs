//! Private group membership collaborator.
//!
//! The invitation protocol does not own private groups; it asks a
//! membership manager to subscribe to groups, record members, reveal
//! relationships and expose groups to contacts. [`GroupMembership`] is that
//! boundary. Every method takes the caller's open transaction so membership
//! changes commit or roll back together with the session change that caused
//! them.
//!
//! [`SqliteGroupMembership`] is the bundled implementation, storing its
//! tables in the same database as the invitation state.

mod sqlite;

use rusqlite::Connection;

pub use sqlite::SqliteGroupMembership;

use crate::error::Result;
use crate::identity::Author;
use crate::ids::{AuthorId, ContactId, GroupId};
use crate::session::Visibility;
use crate::wire::PrivateGroup;

/// Operations the invitation protocol needs from the private group manager.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the manager can be shared.
pub trait GroupMembership: Send + Sync {
    /// Creates any tables the implementation needs.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn initialize_schema(&self, conn: &Connection) -> Result<()>;

    /// Subscribes to a private group, recording the creator as a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn add_private_group(&self, conn: &Connection, group: &PrivateGroup, joined_at: i64) -> Result<()>;

    /// Unsubscribes from a private group and forgets its members.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_private_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<()>;

    /// Whether we are subscribed to the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn contains_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<bool>;

    /// Returns the descriptor of a subscribed group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_private_group(&self, conn: &Connection, private_group_id: &GroupId) -> Result<Option<PrivateGroup>>;

    /// Lists subscribed groups.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn private_groups(&self, conn: &Connection) -> Result<Vec<PrivateGroup>>;

    /// Records that the creator dissolved the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_group_dissolved(&self, conn: &Connection, private_group_id: &GroupId) -> Result<()>;

    /// Whether the creator dissolved the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_dissolved(&self, conn: &Connection, private_group_id: &GroupId) -> Result<bool>;

    /// Records a member of the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn add_member(&self, conn: &Connection, private_group_id: &GroupId, member: &Author) -> Result<()>;

    /// Whether `author_id` is a member of the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_member(&self, conn: &Connection, private_group_id: &GroupId, author_id: &AuthorId) -> Result<bool>;

    /// Records that our relationship with a member has been revealed, and by whom.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn relationship_revealed(
        &self,
        conn: &Connection,
        private_group_id: &GroupId,
        author_id: &AuthorId,
        by_contact: bool,
    ) -> Result<()>;

    /// Sets how the group is exposed to a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn set_group_visibility(
        &self,
        conn: &Connection,
        contact_id: ContactId,
        private_group_id: &GroupId,
        visibility: Visibility,
    ) -> Result<()>;

    /// Returns how the group is exposed to a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_group_visibility(
        &self,
        conn: &Connection,
        contact_id: ContactId,
        private_group_id: &GroupId,
    ) -> Result<Visibility>;
}
