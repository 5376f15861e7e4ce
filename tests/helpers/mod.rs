//! Reusable test helpers for multi-device invitation tests.
//!
//! Each [`Device`] is a separate user with their own database in a
//! temporary directory. Devices exchange messages by copying one side's
//! outgoing messages into the other side's inbound path, the way a sync
//! layer would. All devices share one [`FixedClock`] so tests control time.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use covey_core::clock::FixedClock;
use covey_core::membership::SqliteGroupMembership;
use covey_core::storage::InvitationStorage;
use covey_core::{
    AnySession, ContactId, EventListener, GroupId, GroupInvitationManager, InvitationConfig,
    InvitationEvent, LocalAuthor, RawMessage, Visibility,
};
use tempfile::TempDir;

/// Start time of every test clock.
pub const START: i64 = 1_700_000_000_000;

/// Records every event delivered to a device.
#[derive(Default)]
pub struct EventLog(Mutex<Vec<InvitationEvent>>);

impl EventLog {
    pub fn events(&self) -> Vec<InvitationEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventListener for EventLog {
    fn on_event(&self, event: &InvitationEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

/// One simulated user.
pub struct Device {
    pub manager: GroupInvitationManager,
    pub events: Arc<EventLog>,
    _dir: TempDir,
}

impl Device {
    /// Creates a device with the default configuration.
    pub fn new(name: &str, clock: &Arc<FixedClock>) -> Self {
        Self::with_config(name, clock, InvitationConfig::new())
    }

    /// Creates a device whose database lives in its own temporary directory.
    pub fn with_config(name: &str, clock: &Arc<FixedClock>, config: InvitationConfig) -> Self {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let storage = InvitationStorage::new(&dir.path().join(&config.database_name))
            .expect("should open storage");
        let author = LocalAuthor::generate(name).expect("should generate author");
        let manager = GroupInvitationManager::with_collaborators(
            storage,
            Box::new(SqliteGroupMembership::new()),
            clock.clone(),
            author,
            config,
        )
        .expect("should create manager");
        let events = Arc::new(EventLog::default());
        manager.add_listener(events.clone());
        Self {
            manager,
            events,
            _dir: dir,
        }
    }

    pub fn session(&self, contact: ContactId, group: &GroupId) -> AnySession {
        self.manager
            .get_session(contact, group)
            .expect("should load session")
            .expect("session should exist")
    }

    pub fn visibility(&self, contact: ContactId, group: &GroupId) -> Visibility {
        self.manager
            .get_group_visibility(contact, group)
            .expect("should read visibility")
    }
}

/// Makes two devices contacts of each other.
///
/// Returns the id of `b` at `a` and the id of `a` at `b`.
pub fn connect(a: &Device, b: &Device) -> (ContactId, ContactId) {
    let b_at_a = a
        .manager
        .add_contact(b.manager.local_author().author())
        .expect("should add contact")
        .id;
    let a_at_b = b
        .manager
        .add_contact(a.manager.local_author().author())
        .expect("should add contact")
        .id;
    (b_at_a, a_at_b)
}

/// Copies every pending message from `from` to `to` and acknowledges it.
///
/// Returns the delivered messages.
pub fn deliver(from: &Device, to: &Device, to_at_from: ContactId) -> Vec<RawMessage> {
    let pending = from
        .manager
        .outgoing_messages(to_at_from)
        .expect("should list outgoing messages");
    for raw in &pending {
        to.manager
            .receive_message(&raw.contact_group_id, raw)
            .expect("should receive message");
        from.manager
            .mark_message_acked(&raw.id)
            .expect("should ack message");
    }
    pending
}

/// Creates a group on `creator`, invites `invitee`, and delivers the invitation.
pub fn invite(creator: &Device, invitee: &Device, invitee_at_creator: ContactId, name: &str) -> GroupId {
    let group = creator
        .manager
        .create_private_group(name)
        .expect("should create group");
    creator
        .manager
        .invite_contact(invitee_at_creator, group.id(), Some("Come along"))
        .expect("should send invitation");
    let delivered = deliver(creator, invitee, invitee_at_creator);
    assert_eq!(delivered.len(), 1);
    *group.id()
}
