//! `SQLite` storage for invitation state.
//!
//! This module owns the local database holding contacts, protocol message
//! metadata and session records. Every manager operation runs inside one
//! immediate transaction obtained from [`InvitationStorage::transaction`];
//! the table helpers in the submodules take that transaction as a plain
//! `&Connection` so engines and collaborators share it.
//!
//! # Tables
//!
//! - `contacts`: the contact's author and pairwise contact group
//! - `messages`: one row per protocol message sent or received, with UI and
//!   transport flags
//! - `sessions`: one versioned record per (contact group, session id)

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

pub mod contacts;
pub mod messages;
pub mod sessions;
mod types;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, TransactionBehavior};

pub use types::{Contact, MessageFilter, StoredMessage};

use crate::error::{InvitationError, Result};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_NAME: &str = "invitations.db";

/// `SQLite`-backed storage for invitation state.
///
/// Thread-safe wrapper around a single connection. Operations are
/// serialized by the mutex and made atomic by the transaction.
pub struct InvitationStorage {
    conn: Mutex<Connection>,
}

impl InvitationStorage {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Creates an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| InvitationError::Storage(format!("Failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            r"
            -- Contacts we can exchange invitations with
            CREATE TABLE IF NOT EXISTS contacts (
                contact_id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id BLOB NOT NULL UNIQUE,
                format_version INTEGER NOT NULL,
                author_name TEXT NOT NULL,
                public_key BLOB NOT NULL,
                contact_group_id BLOB NOT NULL UNIQUE,
                supports_auto_delete INTEGER NOT NULL DEFAULT 0,
                auto_delete_timer INTEGER,
                auto_delete_timer_updated INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            -- Protocol messages and their metadata
            CREATE TABLE IF NOT EXISTS messages (
                message_id BLOB PRIMARY KEY,
                contact_group_id BLOB NOT NULL,
                private_group_id BLOB NOT NULL,
                message_type INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                body BLOB NOT NULL,
                local INTEGER NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                visible_in_ui INTEGER NOT NULL DEFAULT 0,
                available_to_answer INTEGER NOT NULL DEFAULT 0,
                accepted INTEGER NOT NULL DEFAULT 0,
                auto_delete_timer INTEGER,
                is_auto_decline INTEGER NOT NULL DEFAULT 0,
                acked INTEGER NOT NULL DEFAULT 0,
                timer_started_at INTEGER,
                received_copy INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages (contact_group_id, private_group_id);

            -- Session records, keyed by contact group and session id
            CREATE TABLE IF NOT EXISTS sessions (
                contact_group_id BLOB NOT NULL,
                session_id BLOB NOT NULL,
                role TEXT NOT NULL,
                record BLOB NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (contact_group_id, session_id)
            );
            ",
        )?;

        Ok(())
    }

    /// Runs `f` inside one immediate transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise,
    /// so a failed operation leaves every table as it was.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a storage error if the lock or the
    /// transaction cannot be obtained.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| InvitationError::Storage(format!("Failed to acquire database lock: {e}")))?;

        let txn = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&*txn)?;
        txn.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for InvitationStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitationStorage").finish_non_exhaustive()
    }
}

/// Converts a stored blob to an id, reporting corrupt rows as invalid data.
pub(crate) fn blob_to_id<T>(
    bytes: &[u8],
    parse: impl FnOnce(&[u8]) -> Option<T>,
    column: &str,
) -> Result<T> {
    parse(bytes).ok_or_else(|| InvitationError::InvalidData(format!("Invalid {column} length")))
}
