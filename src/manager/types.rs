//! Types exposed to the UI layer.
//!
//! Everything here serializes to JSON so a host application can pass it
//! across an FFI boundary without knowing the Rust types. Ids serialize as
//! lowercase hex.

use serde::{Deserialize, Serialize};

use crate::ids::{AuthorId, ContactId, GroupId, MessageId, SessionId};
use crate::storage::StoredMessage;
use crate::wire::{InviteMessage, MembershipMessage, MessageType};

/// An invitation as shown in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRequest {
    pub message_id: MessageId,
    pub contact_id: ContactId,
    pub session_id: SessionId,
    pub private_group_id: GroupId,
    pub group_name: String,
    pub creator_id: AuthorId,
    pub creator_name: String,
    pub text: Option<String>,
    pub timestamp: i64,
    /// Whether we sent it.
    pub local: bool,
    pub read: bool,
    /// Whether the invitation still awaits our answer.
    pub available_to_answer: bool,
    /// Whether we accepted and are still subscribed to the group.
    pub can_be_opened: bool,
    pub auto_delete_timer: Option<i64>,
}

impl InvitationRequest {
    /// A request for an invitation that just arrived.
    pub(crate) fn received(m: &InviteMessage, contact_id: ContactId) -> Self {
        Self {
            message_id: m.id,
            contact_id,
            session_id: SessionId::from(m.private_group_id),
            private_group_id: m.private_group_id,
            group_name: m.group_name.clone(),
            creator_id: *m.creator.id(),
            creator_name: m.creator.name().to_string(),
            text: m.text.clone(),
            timestamp: m.timestamp,
            local: false,
            read: false,
            available_to_answer: true,
            can_be_opened: false,
            auto_delete_timer: m.auto_delete_timer,
        }
    }

    /// A request rebuilt from a stored invitation.
    pub(crate) fn stored(
        stored: &StoredMessage,
        m: &InviteMessage,
        contact_id: ContactId,
        can_be_opened: bool,
    ) -> Self {
        Self {
            local: stored.local,
            read: stored.read,
            available_to_answer: stored.available_to_answer,
            can_be_opened,
            auto_delete_timer: stored.auto_delete_timer,
            ..Self::received(m, contact_id)
        }
    }
}

/// An answer to an invitation as shown in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub message_id: MessageId,
    pub contact_id: ContactId,
    pub session_id: SessionId,
    pub private_group_id: GroupId,
    pub timestamp: i64,
    /// Whether we sent it.
    pub local: bool,
    pub read: bool,
    pub accepted: bool,
    /// Whether the invitation expired rather than being declined by hand.
    pub is_auto_decline: bool,
    pub auto_delete_timer: Option<i64>,
}

impl InvitationResponse {
    /// A response that just arrived from the contact.
    pub(crate) fn received(m: &MembershipMessage, contact_id: ContactId, accepted: bool) -> Self {
        Self {
            message_id: m.id,
            contact_id,
            session_id: SessionId::from(m.private_group_id),
            private_group_id: m.private_group_id,
            timestamp: m.timestamp,
            local: false,
            read: false,
            accepted,
            is_auto_decline: false,
            auto_delete_timer: m.auto_delete_timer,
        }
    }

    /// A response rebuilt from stored metadata.
    pub(crate) fn stored(stored: &StoredMessage, contact_id: ContactId) -> Self {
        Self {
            message_id: stored.id,
            contact_id,
            session_id: SessionId::from(stored.private_group_id),
            private_group_id: stored.private_group_id,
            timestamp: stored.timestamp,
            local: stored.local,
            read: stored.read,
            accepted: stored.message_type == MessageType::Join,
            is_auto_decline: stored.is_auto_decline,
            auto_delete_timer: stored.auto_delete_timer,
        }
    }
}

/// One entry of a conversation's invitation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvitationMessage {
    Request(InvitationRequest),
    Response(InvitationResponse),
}

impl InvitationMessage {
    #[must_use]
    pub const fn message_id(&self) -> &MessageId {
        match self {
            Self::Request(r) => &r.message_id,
            Self::Response(r) => &r.message_id,
        }
    }

    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        match self {
            Self::Request(r) => r.timestamp,
            Self::Response(r) => r.timestamp,
        }
    }

    /// Converts to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Notifications raised by the manager after a change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvitationEvent {
    /// A contact invited us to a private group.
    InvitationReceived {
        contact_id: ContactId,
        request: InvitationRequest,
    },
    /// A contact accepted or declined our invitation.
    InvitationResponseReceived {
        contact_id: ContactId,
        response: InvitationResponse,
    },
}

impl InvitationEvent {
    #[must_use]
    pub const fn contact_id(&self) -> ContactId {
        match self {
            Self::InvitationReceived { contact_id, .. }
            | Self::InvitationResponseReceived { contact_id, .. } => *contact_id,
        }
    }

    /// Converts to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receives [`InvitationEvent`]s.
///
/// Listeners are called on the thread that performed the operation, after
/// its transaction committed.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &InvitationEvent);
}

/// A private group we have open invitations to, across contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInvitationItem {
    pub private_group_id: GroupId,
    pub group_name: String,
    pub creator_id: AuthorId,
    pub creator_name: String,
    /// Contacts whose invitation to this group awaits an answer.
    pub sharers: Vec<ContactId>,
    /// Whether we are already subscribed to the group.
    pub subscribed: bool,
}

impl GroupInvitationItem {
    /// Converts to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Outcome of a message deletion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    /// Number of messages deleted.
    pub deleted: usize,
    /// Some messages were kept because their session is still in progress.
    pub in_progress: bool,
    /// Some messages were kept because the selection covered only part of a session.
    pub not_all_selected: bool,
}

impl DeletionResult {
    /// Whether everything requested was deleted.
    #[must_use]
    pub const fn all_deleted(&self) -> bool {
        !self.in_progress && !self.not_all_selected
    }

    /// Folds another result into this one.
    pub fn add(&mut self, other: Self) {
        self.deleted += other.deleted;
        self.in_progress |= other.in_progress;
        self.not_all_selected |= other.not_all_selected;
    }
}
