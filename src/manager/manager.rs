//! High-level group invitation API.
//!
//! [`GroupInvitationManager`] owns the invitation database, the private group
//! membership collaborator and the clock. Every public operation runs in one
//! storage transaction, routes through the role engines and delivers the
//! resulting events to listeners once the transaction has committed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::Connection;

use super::deletion::{self, Selection};
use super::router::{self, LocalAction};
use super::types::{
    DeletionResult, EventListener, GroupInvitationItem, InvitationEvent, InvitationMessage,
    InvitationRequest, InvitationResponse,
};
use crate::clock::{Clock, SystemClock};
use crate::config::InvitationConfig;
use crate::engine::EngineContext;
use crate::error::{InvitationError, Result};
use crate::identity::{contact_group_id, Author, LocalAuthor};
use crate::ids::{ContactId, GroupId, MessageId};
use crate::membership::{GroupMembership, SqliteGroupMembership};
use crate::session::{AnySession, CreatorSession, CreatorState, PeerSession, Role, Visibility};
use crate::storage::{contacts, messages, sessions, Contact, InvitationStorage, MessageFilter, StoredMessage};
use crate::wire::{decode, sign_invitation, MessageType, PrivateGroup, ProtocolMessage, RawMessage};

/// High-level API for private group invitations.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use covey_core::{GroupInvitationManager, InvitationConfig, LocalAuthor};
///
/// let author = LocalAuthor::generate("alice")?;
/// let manager = GroupInvitationManager::new(Path::new("/data/covey"), author, InvitationConfig::new())?;
/// let group = manager.create_private_group("Book club")?;
/// manager.invite_contact(contact_id, group.id(), Some("Join us"))?;
/// for raw in manager.outgoing_messages(contact_id)? {
///     // hand `raw` to the sync layer
/// }
/// ```
pub struct GroupInvitationManager {
    storage: InvitationStorage,
    membership: Box<dyn GroupMembership>,
    clock: Arc<dyn Clock>,
    local_author: LocalAuthor,
    config: InvitationConfig,
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
}

impl GroupInvitationManager {
    /// Creates a manager storing its database in `data_dir`.
    ///
    /// Creates the directory and the database if they don't exist, and uses
    /// the bundled [`SqliteGroupMembership`] and the system clock.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory holding the invitation database
    /// * `local_author` - Identity of the local user
    /// * `config` - Database name and auto-delete defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn new(data_dir: &Path, local_author: LocalAuthor, config: InvitationConfig) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| InvitationError::Storage(format!("Failed to create data directory: {e}")))?;

        let db_path = data_dir.join(&config.database_name);
        let storage = InvitationStorage::new(&db_path)?;

        Self::with_collaborators(
            storage,
            Box::new(SqliteGroupMembership::new()),
            Arc::new(SystemClock),
            local_author,
            config,
        )
    }

    /// Creates a manager from explicitly constructed parts.
    ///
    /// The membership collaborator's schema is initialized in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails.
    pub fn with_collaborators(
        storage: InvitationStorage,
        membership: Box<dyn GroupMembership>,
        clock: Arc<dyn Clock>,
        local_author: LocalAuthor,
        config: InvitationConfig,
    ) -> Result<Self> {
        storage.transaction(|conn| membership.initialize_schema(conn))?;
        Ok(Self {
            storage,
            membership,
            clock,
            local_author,
            config,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Creates a manager backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(local_author: LocalAuthor, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_collaborators(
            InvitationStorage::in_memory()?,
            Box::new(SqliteGroupMembership::new()),
            clock,
            local_author,
            InvitationConfig::new(),
        )
    }

    /// The local user's identity.
    #[must_use]
    pub const fn local_author(&self) -> &LocalAuthor {
        &self.local_author
    }

    #[must_use]
    pub const fn config(&self) -> &InvitationConfig {
        &self.config
    }

    /// Registers a listener for events raised by later operations.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    // ==================== Plumbing ====================

    /// Runs `f` in one transaction and delivers the events it raised after
    /// the commit.
    fn transact<T>(&self, f: impl FnOnce(&Connection, &mut Vec<InvitationEvent>) -> Result<T>) -> Result<T> {
        let (value, events) = self.storage.transaction(|conn| {
            let mut events = Vec::new();
            let value = f(conn, &mut events)?;
            Ok((value, events))
        })?;
        self.dispatch(&events);
        Ok(value)
    }

    fn dispatch(&self, events: &[InvitationEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for event in events {
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }

    fn context<'a>(&'a self, conn: &'a Connection, contact: Contact) -> EngineContext<'a> {
        EngineContext::new(
            conn,
            self.membership.as_ref(),
            self.clock.as_ref(),
            &self.local_author,
            contact,
        )
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ==================== Private Groups ====================

    /// Creates a private group with the local user as creator and subscribes to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or storage fails.
    pub fn create_private_group(&self, name: &str) -> Result<PrivateGroup> {
        let group = PrivateGroup::generate(name, self.local_author.author().clone())?;
        self.transact(|conn, _| {
            self.membership.add_private_group(conn, &group, self.now())?;
            log::info!("Created private group {}", group.id().short());
            Ok(())
        })?;
        Ok(group)
    }

    /// Lists the private groups we are subscribed to.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn private_groups(&self) -> Result<Vec<PrivateGroup>> {
        self.transact(|conn, _| self.membership.private_groups(conn))
    }

    /// Returns how a private group is exposed to a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn get_group_visibility(&self, contact_id: ContactId, private_group_id: &GroupId) -> Result<Visibility> {
        self.transact(|conn, _| {
            require_contact(conn, contact_id)?;
            self.membership
                .get_group_visibility(conn, contact_id, private_group_id)
        })
    }

    /// Leaves or dissolves a private group.
    ///
    /// Every session about the group is told we left, then the group is
    /// removed from the membership store.
    ///
    /// # Errors
    ///
    /// Returns an error if a session is in an unexpected state or storage fails.
    pub fn removing_group(&self, private_group_id: &GroupId) -> Result<()> {
        self.transact(|conn, events| {
            for contact in contacts::get_contacts(conn)? {
                let mut ctx = self.context(conn, contact);
                if let Some(session) = router::find_session(&ctx, private_group_id)? {
                    router::on_action(
                        &mut ctx,
                        session,
                        LocalAction::Leave {
                            is_auto_decline: false,
                        },
                    )?;
                }
                events.append(&mut ctx.events);
            }
            self.membership.remove_private_group(conn, private_group_id)
        })
    }

    /// Records a new member of a private group.
    ///
    /// Called by the private group layer when someone joins. Every contact
    /// with the member's identity gets a peer session for the group, so the
    /// two of us can reveal our relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if we are not subscribed to the group, a peer session
    /// is in an unexpected state, or storage fails.
    pub fn adding_member(&self, private_group_id: &GroupId, member: &Author) -> Result<()> {
        self.transact(|conn, events| {
            if !self.membership.contains_group(conn, private_group_id)? {
                return Err(InvitationError::GroupNotFound(private_group_id.short()));
            }
            if self.membership.is_member(conn, private_group_id, member.id())? {
                log::debug!(
                    "{} is already a member of {}",
                    member.id().short(),
                    private_group_id.short()
                );
                return Ok(());
            }
            self.membership.add_member(conn, private_group_id, member)?;
            if member.is(self.local_author.author().id()) {
                return Ok(());
            }
            for contact in contacts::get_contacts_by_author(conn, member.id())? {
                let mut ctx = self.context(conn, contact);
                self.peer_member_added(&mut ctx, private_group_id)?;
                events.append(&mut ctx.events);
            }
            Ok(())
        })
    }

    /// Creates or loads the peer session for the context's contact and
    /// applies the member-added action to it.
    fn peer_member_added(&self, ctx: &mut EngineContext<'_>, private_group_id: &GroupId) -> Result<()> {
        let session = match router::find_session(ctx, private_group_id)? {
            Some(session) if session.role() != Role::Peer => {
                log::debug!(
                    "Contact {} has a {} session for {}, not adding a peer",
                    ctx.contact.id,
                    session.role().as_str(),
                    private_group_id.short()
                );
                return Ok(());
            }
            Some(session) => session,
            None => PeerSession::new(ctx.contact.contact_group_id, *private_group_id).into(),
        };
        router::on_action(ctx, session, LocalAction::MemberAdded)?;
        Ok(())
    }

    // ==================== Contacts ====================

    /// Adds a contact we can exchange invitations with.
    ///
    /// Peer sessions are created for every subscribed group the contact is
    /// already a member of.
    ///
    /// # Errors
    ///
    /// Returns an error if the author is ourselves, the contact already
    /// exists, or storage fails.
    pub fn add_contact(&self, author: &Author) -> Result<Contact> {
        let local_id = *self.local_author.author().id();
        if author.is(&local_id) {
            return Err(InvitationError::InvalidData(
                "Cannot add ourselves as a contact".to_string(),
            ));
        }
        self.transact(|conn, events| {
            let contact = contacts::insert_contact(
                conn,
                author,
                contact_group_id(&local_id, author.id()),
                self.config.auto_delete_support,
                self.config.default_auto_delete_timer,
                self.now(),
            )?;
            log::info!("Added contact {}", contact.id);

            for group in self.membership.private_groups(conn)? {
                if self.membership.is_member(conn, group.id(), author.id())? {
                    let mut ctx = self.context(conn, contact.clone());
                    self.peer_member_added(&mut ctx, group.id())?;
                    events.append(&mut ctx.events);
                }
            }
            Ok(contact)
        })
    }

    /// Removes a contact with its sessions and messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn remove_contact(&self, contact_id: ContactId) -> Result<()> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            sessions::delete_sessions_for_contact(conn, &contact.contact_group_id)?;
            messages::delete_contact_messages(conn, &contact.contact_group_id)?;
            contacts::delete_contact(conn, contact_id)?;
            log::info!("Removed contact {contact_id}");
            Ok(())
        })
    }

    /// Retrieves a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn get_contact(&self, contact_id: ContactId) -> Result<Option<Contact>> {
        self.transact(|conn, _| contacts::get_contact(conn, contact_id))
    }

    /// Lists all contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn get_contacts(&self) -> Result<Vec<Contact>> {
        self.transact(|conn, _| contacts::get_contacts(conn))
    }

    /// Sets the auto-delete timer for messages we send to a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn set_auto_delete_timer(&self, contact_id: ContactId, timer: Option<i64>) -> Result<()> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            let updated_at = self.now().max(contact.auto_delete_timer_updated.saturating_add(1));
            contacts::update_auto_delete_timer(conn, contact_id, timer, updated_at)?;
            Ok(())
        })
    }

    // ==================== Invitations ====================

    /// Sends an invitation that the caller has already signed.
    ///
    /// The signature must cover `timestamp`, the contact group and the
    /// private group (see [`sign_invitation`]).
    ///
    /// # Arguments
    ///
    /// * `contact_id` - Contact to invite
    /// * `private_group_id` - A group we created
    /// * `text` - Optional message shown with the invitation
    /// * `timestamp` - Timestamp the signature covers
    /// * `signature` - Creator signature over the invitation
    ///
    /// # Errors
    ///
    /// Returns an error if the contact or group does not exist, a session
    /// with another role exists, the contact was already invited, or storage
    /// fails.
    pub fn send_invitation(
        &self,
        contact_id: ContactId,
        private_group_id: &GroupId,
        text: Option<&str>,
        timestamp: i64,
        signature: &[u8],
    ) -> Result<()> {
        self.transact(|conn, events| {
            let contact = require_contact(conn, contact_id)?;
            let mut ctx = self.context(conn, contact);
            let session = match router::find_session(&ctx, private_group_id)? {
                Some(session) => session,
                None => CreatorSession::new(ctx.contact.contact_group_id, *private_group_id).into(),
            };
            router::on_action(
                &mut ctx,
                session,
                LocalAction::Invite {
                    text,
                    timestamp,
                    signature,
                },
            )?;
            events.append(&mut ctx.events);
            Ok(())
        })
    }

    /// Signs and sends an invitation timestamped now.
    ///
    /// # Errors
    ///
    /// See [`Self::send_invitation`].
    pub fn invite_contact(&self, contact_id: ContactId, private_group_id: &GroupId, text: Option<&str>) -> Result<()> {
        let contact = self
            .get_contact(contact_id)?
            .ok_or_else(|| InvitationError::ContactNotFound(contact_id.to_string()))?;
        let timestamp = self.now();
        let signature = sign_invitation(
            &self.local_author,
            &contact.contact_group_id,
            private_group_id,
            timestamp,
        )?;
        self.send_invitation(contact_id, private_group_id, text, timestamp, &signature)
    }

    /// Accepts or declines an invitation from a contact.
    ///
    /// # Errors
    ///
    /// Returns [`InvitationError::SessionNotFound`] if the contact never
    /// invited us, [`InvitationError::InvalidRole`] if the session with the
    /// contact is not an invitee session, or an error if the invitation is
    /// no longer open or storage fails.
    pub fn respond_to_invitation(&self, contact_id: ContactId, private_group_id: &GroupId, accept: bool) -> Result<()> {
        self.transact(|conn, events| {
            let contact = require_contact(conn, contact_id)?;
            let mut ctx = self.context(conn, contact);
            let session = router::find_session(&ctx, private_group_id)?
                .ok_or_else(|| session_not_found(contact_id, private_group_id))?;
            if session.role() != Role::Invitee {
                return Err(InvitationError::InvalidRole {
                    role: session.role(),
                    operation: "respond to invitation",
                });
            }
            let action = if accept {
                LocalAction::Join
            } else {
                LocalAction::Leave {
                    is_auto_decline: false,
                }
            };
            router::on_action(&mut ctx, session, action)?;
            events.append(&mut ctx.events);
            Ok(())
        })
    }

    /// Reveals to a fellow group member that they are also our contact.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no peer session with the contact for the
    /// group, the relationship cannot be revealed in its current state, or
    /// storage fails.
    pub fn reveal_relationship(&self, contact_id: ContactId, private_group_id: &GroupId) -> Result<()> {
        self.transact(|conn, events| {
            let contact = require_contact(conn, contact_id)?;
            let mut ctx = self.context(conn, contact);
            let session = router::find_session(&ctx, private_group_id)?
                .ok_or_else(|| session_not_found(contact_id, private_group_id))?;
            if session.role() != Role::Peer {
                return Err(InvitationError::InvalidRole {
                    role: session.role(),
                    operation: "reveal relationship",
                });
            }
            router::on_action(&mut ctx, session, LocalAction::Join)?;
            events.append(&mut ctx.events);
            Ok(())
        })
    }

    /// Whether the contact can be invited to the group right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn is_invitation_allowed(&self, contact_id: ContactId, private_group_id: &GroupId) -> Result<bool> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            let ctx = self.context(conn, contact);
            Ok(match router::find_session(&ctx, private_group_id)? {
                None => true,
                Some(AnySession::Creator(s)) => s.state == CreatorState::Start,
                Some(_) => false,
            })
        })
    }

    /// Lists groups with invitations awaiting our answer, across contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or a stored invitation is corrupt.
    pub fn get_invitations(&self) -> Result<Vec<GroupInvitationItem>> {
        self.transact(|conn, _| {
            let mut items: BTreeMap<GroupId, GroupInvitationItem> = BTreeMap::new();
            let filter = MessageFilter::new().answerable().local(false);
            for contact in contacts::get_contacts(conn)? {
                for stored in messages::list_messages(conn, &contact.contact_group_id, &filter)? {
                    let ProtocolMessage::Invite(invite) = decode(&stored.raw())? else {
                        continue;
                    };
                    if let Some(item) = items.get_mut(&invite.private_group_id) {
                        if !item.sharers.contains(&contact.id) {
                            item.sharers.push(contact.id);
                        }
                        continue;
                    }
                    let subscribed = self.membership.contains_group(conn, &invite.private_group_id)?;
                    items.insert(
                        invite.private_group_id,
                        GroupInvitationItem {
                            private_group_id: invite.private_group_id,
                            group_name: invite.group_name,
                            creator_id: *invite.creator.id(),
                            creator_name: invite.creator.name().to_string(),
                            sharers: vec![contact.id],
                            subscribed,
                        },
                    );
                }
            }
            Ok(items.into_values().collect())
        })
    }

    /// Returns a session, mainly for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn get_session(&self, contact_id: ContactId, private_group_id: &GroupId) -> Result<Option<AnySession>> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            router::find_session(&self.context(conn, contact), private_group_id)
        })
    }

    // ==================== Conversation ====================

    /// Lists the invitation history shown in the conversation with a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist, storage fails, or a
    /// stored invitation is corrupt.
    pub fn get_invitation_messages(&self, contact_id: ContactId) -> Result<Vec<InvitationMessage>> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            let stored = messages::list_messages(conn, &contact.contact_group_id, &MessageFilter::new().visible())?;
            let mut result = Vec::with_capacity(stored.len());
            for message in stored {
                match message.message_type {
                    MessageType::Invite => {
                        let ProtocolMessage::Invite(invite) = decode(&message.raw())? else {
                            continue;
                        };
                        let can_be_opened = message.accepted
                            && self.membership.contains_group(conn, &invite.private_group_id)?;
                        result.push(InvitationMessage::Request(InvitationRequest::stored(
                            &message,
                            &invite,
                            contact_id,
                            can_be_opened,
                        )));
                    }
                    MessageType::Join | MessageType::Leave => {
                        result.push(InvitationMessage::Response(InvitationResponse::stored(
                            &message, contact_id,
                        )));
                    }
                    MessageType::Abort => {}
                }
            }
            Ok(result)
        })
    }

    /// Ids of the messages shown in the conversation with a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn get_message_ids(&self, contact_id: ContactId) -> Result<Vec<MessageId>> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            deletion::visible_message_ids(conn, &contact)
        })
    }

    /// Marks a message as read. Returns whether it was unread.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn mark_message_read(&self, message_id: &MessageId) -> Result<bool> {
        self.transact(|conn, _| messages::mark_read(conn, message_id, self.now()))
    }

    /// Deletes every message in the conversation whose session allows it.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn delete_all_messages(&self, contact_id: ContactId) -> Result<DeletionResult> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            deletion::delete_messages(conn, &contact, Selection::All)
        })
    }

    /// Deletes the selected messages of a conversation.
    ///
    /// A session's messages are only deleted together, and only once the
    /// session is complete and all its messages were delivered. The result
    /// reports why anything was kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn delete_messages(&self, contact_id: ContactId, message_ids: &[MessageId]) -> Result<DeletionResult> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            deletion::delete_messages(conn, &contact, Selection::Only(message_ids))
        })
    }

    /// Deletes messages whose auto-delete timer has run out.
    ///
    /// An expiring invitation that still awaits our answer is declined
    /// automatically first. Returns the number of messages deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn delete_expired_messages(&self) -> Result<usize> {
        self.transact(|conn, events| {
            let expired = messages::expired_messages(conn, self.now())?;
            for message in &expired {
                if message.message_type != MessageType::Invite || message.local {
                    continue;
                }
                // Re-read: an earlier decline may already have answered it.
                let answerable = messages::get_message(conn, &message.id)?
                    .is_some_and(|m| m.available_to_answer);
                if !answerable {
                    continue;
                }
                let Some(contact) = contacts::get_contact_by_group(conn, &message.contact_group_id)? else {
                    continue;
                };
                let mut ctx = self.context(conn, contact);
                if let Some(session) = router::find_session(&ctx, &message.private_group_id)? {
                    router::on_action(
                        &mut ctx,
                        session,
                        LocalAction::Leave {
                            is_auto_decline: true,
                        },
                    )?;
                }
                events.append(&mut ctx.events);
            }
            for message in &expired {
                messages::delete_message(conn, &message.id)?;
            }
            if !expired.is_empty() {
                log::debug!("Deleted {} expired messages", expired.len());
            }
            Ok(expired.len())
        })
    }

    // ==================== Transport ====================

    /// Messages to a contact that the sync layer has not yet confirmed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact does not exist or storage fails.
    pub fn outgoing_messages(&self, contact_id: ContactId) -> Result<Vec<RawMessage>> {
        self.transact(|conn, _| {
            let contact = require_contact(conn, contact_id)?;
            let pending = messages::list_messages(
                conn,
                &contact.contact_group_id,
                &MessageFilter::new().local(true).unacked(),
            )?;
            Ok(pending.iter().map(|m| m.raw()).collect())
        })
    }

    /// Records that the contact received one of our messages.
    ///
    /// Starts the message's auto-delete countdown. Returns whether the
    /// message was pending.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn mark_message_acked(&self, message_id: &MessageId) -> Result<bool> {
        self.transact(|conn, _| messages::mark_acked(conn, message_id, self.now()))
    }

    /// Handles a message the sync layer delivered in a contact group.
    ///
    /// Returns `false` for a message that was already received.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed or was not sent in
    /// `contact_group_id`, no contact owns the group, the message cannot
    /// open a session, or storage fails. Protocol violations by the contact
    /// are not errors; they move the session to its error state.
    pub fn receive_message(&self, contact_group_id: &GroupId, raw: &RawMessage) -> Result<bool> {
        if raw.contact_group_id != *contact_group_id {
            return Err(InvitationError::InvalidData(format!(
                "Message {} belongs to another contact group",
                raw.id.short()
            )));
        }
        if raw.id != RawMessage::derive_id(&raw.contact_group_id, raw.timestamp, &raw.body) {
            return Err(InvitationError::InvalidData(format!(
                "Message {} has a mismatched id",
                raw.id.short()
            )));
        }
        let message = decode(raw).map_err(|e| {
            log::warn!(
                "Rejected message {} in contact group {}: {e}",
                raw.id.short(),
                contact_group_id.short()
            );
            e
        })?;

        self.transact(|conn, events| {
            let contact = contacts::get_contact_by_group(conn, contact_group_id)?
                .ok_or_else(|| InvitationError::ContactNotFound(contact_group_id.short()))?;
            let mut stored =
                StoredMessage::incoming(raw, *message.private_group_id(), message.message_type());
            stored.auto_delete_timer = message.auto_delete_timer();
            if !messages::insert_message(conn, &stored)? {
                // Both sides can send the same bytes at the same millisecond.
                if !messages::mark_received_copy(conn, &raw.id)? {
                    log::debug!("Ignoring duplicate message {}", raw.id.short());
                    return Ok(false);
                }
                log::debug!("Message {} matches one we sent", raw.id.short());
            }
            let mut ctx = self.context(conn, contact);
            router::on_message(&mut ctx, &message)?;
            events.append(&mut ctx.events);
            Ok(true)
        })
    }
}

impl std::fmt::Debug for GroupInvitationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupInvitationManager")
            .field("local_author", self.local_author.author().id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn require_contact(conn: &Connection, contact_id: ContactId) -> Result<Contact> {
    contacts::get_contact(conn, contact_id)?
        .ok_or_else(|| InvitationError::ContactNotFound(contact_id.to_string()))
}

fn session_not_found(contact_id: ContactId, private_group_id: &GroupId) -> InvitationError {
    InvitationError::SessionNotFound(format!(
        "contact {contact_id}, group {}",
        private_group_id.short()
    ))
}
