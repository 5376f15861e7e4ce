//! Manager configuration.

use crate::storage::DEFAULT_DATABASE_NAME;
use crate::wire::limits::{MAX_AUTO_DELETE_TIMER_MS, MIN_AUTO_DELETE_TIMER_MS};

/// Settings for a [`GroupInvitationManager`](crate::GroupInvitationManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationConfig {
    /// File name of the database inside the data directory.
    pub database_name: String,
    /// Whether newly added contacts are assumed to understand auto-delete timers.
    pub auto_delete_support: bool,
    /// Timer applied to newly added contacts, in milliseconds.
    pub default_auto_delete_timer: Option<i64>,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl InvitationConfig {
    /// Creates the default configuration: `invitations.db`, no auto-delete.
    #[must_use]
    pub fn new() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            auto_delete_support: false,
            default_auto_delete_timer: None,
        }
    }

    /// Sets the database file name.
    #[must_use]
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets whether new contacts support auto-delete timers.
    #[must_use]
    pub const fn with_auto_delete_support(mut self, supported: bool) -> Self {
        self.auto_delete_support = supported;
        self
    }

    /// Sets the timer given to new contacts.
    ///
    /// Values are clamped to the range the wire format accepts. Setting a
    /// timer also turns on auto-delete support.
    #[must_use]
    pub fn with_default_auto_delete_timer(mut self, timer_ms: Option<i64>) -> Self {
        self.default_auto_delete_timer =
            timer_ms.map(|t| t.clamp(MIN_AUTO_DELETE_TIMER_MS, MAX_AUTO_DELETE_TIMER_MS));
        if timer_ms.is_some() {
            self.auto_delete_support = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InvitationConfig::default();
        assert_eq!(config.database_name, "invitations.db");
        assert!(!config.auto_delete_support);
        assert_eq!(config.default_auto_delete_timer, None);
    }

    #[test]
    fn builder_sets_fields() {
        let config = InvitationConfig::new()
            .with_database_name("groups.db")
            .with_default_auto_delete_timer(Some(86_400_000));
        assert_eq!(config.database_name, "groups.db");
        assert!(config.auto_delete_support);
        assert_eq!(config.default_auto_delete_timer, Some(86_400_000));
    }

    #[test]
    fn timer_is_clamped() {
        let short = InvitationConfig::new().with_default_auto_delete_timer(Some(1));
        assert_eq!(short.default_auto_delete_timer, Some(MIN_AUTO_DELETE_TIMER_MS));
        let long = InvitationConfig::new().with_default_auto_delete_timer(Some(i64::MAX));
        assert_eq!(long.default_auto_delete_timer, Some(MAX_AUTO_DELETE_TIMER_MS));
    }
}
