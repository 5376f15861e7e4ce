//! Row types for invitation storage.

use crate::identity::Author;
use crate::ids::{ContactId, GroupId, MessageId};
use crate::wire::{MessageType, RawMessage};

/// A contact we can exchange invitations with.
#[derive(Clone, PartialEq, Eq)]
pub struct Contact {
    /// Local row id.
    pub id: ContactId,
    /// The contact's public identity.
    pub author: Author,
    /// Pairwise group carrying all messages with this contact.
    pub contact_group_id: GroupId,
    /// Whether the contact's client understands auto-delete timers.
    pub supports_auto_delete: bool,
    /// Current auto-delete timer for the conversation, in milliseconds.
    pub auto_delete_timer: Option<i64>,
    /// Timestamp of the message that last changed the timer.
    pub auto_delete_timer_updated: i64,
    /// When the contact was added (Unix millis).
    pub created_at: i64,
}

impl Contact {
    /// Timer to attach to outgoing visible messages.
    ///
    /// `None` means the trailing timer field is omitted, which is the only
    /// encoding older clients accept.
    #[must_use]
    pub const fn outgoing_timer(&self) -> Option<i64> {
        if self.supports_auto_delete {
            self.auto_delete_timer
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contact")
            .field("id", &self.id)
            .field("author", self.author.id())
            .field("contact_group_id", &self.contact_group_id)
            .field("supports_auto_delete", &self.supports_auto_delete)
            .field("auto_delete_timer", &self.auto_delete_timer)
            .finish_non_exhaustive()
    }
}

/// A protocol message with its local metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub contact_group_id: GroupId,
    pub private_group_id: GroupId,
    pub message_type: MessageType,
    pub timestamp: i64,
    pub body: Vec<u8>,
    /// Sent by us rather than received.
    pub local: bool,
    pub read: bool,
    /// Shown in the conversation with the contact.
    pub visible_in_ui: bool,
    /// An invitation the user can still accept or decline.
    pub available_to_answer: bool,
    /// An invitation the user accepted.
    pub accepted: bool,
    pub auto_delete_timer: Option<i64>,
    /// A decline sent automatically when an unanswered invitation expired.
    pub is_auto_decline: bool,
    /// Delivery acknowledged by the contact. Received messages are always acked.
    pub acked: bool,
    /// When the auto-delete countdown began, if it has.
    pub timer_started_at: Option<i64>,
}

impl StoredMessage {
    /// Metadata for a message we are about to send.
    #[must_use]
    pub fn outgoing(raw: &RawMessage, private_group_id: GroupId, message_type: MessageType) -> Self {
        Self {
            id: raw.id,
            contact_group_id: raw.contact_group_id,
            private_group_id,
            message_type,
            timestamp: raw.timestamp,
            body: raw.body.clone(),
            local: true,
            read: true,
            visible_in_ui: false,
            available_to_answer: false,
            accepted: false,
            auto_delete_timer: None,
            is_auto_decline: false,
            acked: false,
            timer_started_at: None,
        }
    }

    /// Metadata for a message just received from the contact.
    #[must_use]
    pub fn incoming(raw: &RawMessage, private_group_id: GroupId, message_type: MessageType) -> Self {
        Self {
            local: false,
            read: false,
            acked: true,
            ..Self::outgoing(raw, private_group_id, message_type)
        }
    }

    /// Rebuilds the raw message for transport.
    #[must_use]
    pub fn raw(&self) -> RawMessage {
        RawMessage {
            id: self.id,
            contact_group_id: self.contact_group_id,
            timestamp: self.timestamp,
            body: self.body.clone(),
        }
    }
}

impl std::fmt::Debug for StoredMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredMessage")
            .field("id", &self.id)
            .field("private_group_id", &self.private_group_id)
            .field("message_type", &self.message_type)
            .field("timestamp", &self.timestamp)
            .field("local", &self.local)
            .field("visible_in_ui", &self.visible_in_ui)
            .field("acked", &self.acked)
            .finish_non_exhaustive()
    }
}

/// Which messages of a contact group to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Restrict to one private group.
    pub private_group_id: Option<GroupId>,
    /// Restrict to messages shown in the conversation.
    pub visible_in_ui: Option<bool>,
    /// Restrict to invitations still awaiting an answer.
    pub available_to_answer: Option<bool>,
    /// Restrict by sender.
    pub local: Option<bool>,
    /// Restrict by acknowledgement.
    pub acked: Option<bool>,
}

impl MessageFilter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            private_group_id: None,
            visible_in_ui: None,
            available_to_answer: None,
            local: None,
            acked: None,
        }
    }

    #[must_use]
    pub const fn in_group(mut self, private_group_id: GroupId) -> Self {
        self.private_group_id = Some(private_group_id);
        self
    }

    #[must_use]
    pub const fn visible(mut self) -> Self {
        self.visible_in_ui = Some(true);
        self
    }

    #[must_use]
    pub const fn answerable(mut self) -> Self {
        self.available_to_answer = Some(true);
        self
    }

    #[must_use]
    pub const fn local(mut self, local: bool) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub const fn unacked(mut self) -> Self {
        self.acked = Some(false);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(supports: bool) -> Contact {
        Contact {
            id: ContactId(1),
            author: Author::new("bob", [2; 32]).unwrap(),
            contact_group_id: GroupId::from_bytes([3; 32]),
            supports_auto_delete: supports,
            auto_delete_timer: Some(120_000),
            auto_delete_timer_updated: 0,
            created_at: 0,
        }
    }

    #[test]
    fn outgoing_timer_requires_support() {
        assert_eq!(contact(true).outgoing_timer(), Some(120_000));
        assert_eq!(contact(false).outgoing_timer(), None);
    }

    #[test]
    fn incoming_is_acked_and_unread() {
        let raw = RawMessage::new(GroupId::from_bytes([1; 32]), 5, vec![1]);
        let m = StoredMessage::incoming(&raw, GroupId::from_bytes([2; 32]), MessageType::Join);
        assert!(m.acked);
        assert!(!m.read);
        assert!(!m.local);
        assert_eq!(m.raw(), raw);

        let m = StoredMessage::outgoing(&raw, GroupId::from_bytes([2; 32]), MessageType::Join);
        assert!(!m.acked);
        assert!(m.local);
    }

    #[test]
    fn filter_builder() {
        let f = MessageFilter::new().visible().answerable().local(false);
        assert_eq!(f.visible_in_ui, Some(true));
        assert_eq!(f.available_to_answer, Some(true));
        assert_eq!(f.local, Some(false));
        assert_eq!(f.acked, None);
    }
}
