//! Protocol message types.

use sha2::{Digest, Sha256};

use crate::identity::{signed_data, Author};
use crate::ids::{GroupId, MessageId};

use super::limits::GROUP_SALT_LENGTH;

const MESSAGE_ID_LABEL: &str = "covey.message/ID";

/// Kind of protocol message, as carried in the leading type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Invite,
    Join,
    Leave,
    Abort,
}

impl MessageType {
    /// Returns the wire tag.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Invite => 0,
            Self::Join => 1,
            Self::Leave => 2,
            Self::Abort => 3,
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub const fn from_tag(tag: i128) -> Option<Self> {
        match tag {
            0 => Some(Self::Invite),
            1 => Some(Self::Join),
            2 => Some(Self::Leave),
            3 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// A message as handed to and received from the sync layer.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Hash of the contact group, timestamp and body.
    pub id: MessageId,
    /// The pairwise group this message travels in.
    pub contact_group_id: GroupId,
    /// Sender's timestamp in milliseconds.
    pub timestamp: i64,
    /// CBOR-encoded body.
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Builds a raw message, deriving its id.
    #[must_use]
    pub fn new(contact_group_id: GroupId, timestamp: i64, body: Vec<u8>) -> Self {
        let id = Self::derive_id(&contact_group_id, timestamp, &body);
        Self {
            id,
            contact_group_id,
            timestamp,
            body,
        }
    }

    /// Computes the id a message with these fields must have.
    #[must_use]
    pub fn derive_id(contact_group_id: &GroupId, timestamp: i64, body: &[u8]) -> MessageId {
        let mut hasher = Sha256::new();
        hasher.update(signed_data(MESSAGE_ID_LABEL, &[]));
        hasher.update(contact_group_id.as_bytes());
        hasher.update(timestamp.to_be_bytes());
        hasher.update(body);
        MessageId::from_bytes(hasher.finalize().into())
    }
}

impl std::fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMessage")
            .field("id", &self.id)
            .field("contact_group_id", &self.contact_group_id)
            .field("timestamp", &self.timestamp)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// An invitation from the group creator.
#[derive(Clone, PartialEq, Eq)]
pub struct InviteMessage {
    pub id: MessageId,
    pub contact_group_id: GroupId,
    /// Derived from `creator`, `group_name` and `salt` on decode.
    pub private_group_id: GroupId,
    pub timestamp: i64,
    pub group_name: String,
    pub creator: Author,
    pub salt: [u8; GROUP_SALT_LENGTH],
    pub text: Option<String>,
    pub signature: Vec<u8>,
    pub auto_delete_timer: Option<i64>,
}

impl std::fmt::Debug for InviteMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteMessage")
            .field("id", &self.id)
            .field("private_group_id", &self.private_group_id)
            .field("timestamp", &self.timestamp)
            .field("creator", self.creator.id())
            .field("text", &self.text.as_ref().map(|_| "<redacted>"))
            .field("auto_delete_timer", &self.auto_delete_timer)
            .finish_non_exhaustive()
    }
}

/// A join or leave message.
///
/// Both kinds share a shape: a causal pointer to the last message received
/// from the other side, plus an optional auto-delete timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipMessage {
    pub id: MessageId,
    pub contact_group_id: GroupId,
    pub private_group_id: GroupId,
    pub timestamp: i64,
    /// Id of the last message the sender had received in this session.
    pub previous_message_id: Option<MessageId>,
    pub auto_delete_timer: Option<i64>,
}

pub type JoinMessage = MembershipMessage;
pub type LeaveMessage = MembershipMessage;

/// Tells the other side the session is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortMessage {
    pub id: MessageId,
    pub contact_group_id: GroupId,
    pub private_group_id: GroupId,
    pub timestamp: i64,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    Invite(InviteMessage),
    Join(JoinMessage),
    Leave(LeaveMessage),
    Abort(AbortMessage),
}

impl ProtocolMessage {
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Invite(_) => MessageType::Invite,
            Self::Join(_) => MessageType::Join,
            Self::Leave(_) => MessageType::Leave,
            Self::Abort(_) => MessageType::Abort,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &MessageId {
        match self {
            Self::Invite(m) => &m.id,
            Self::Join(m) | Self::Leave(m) => &m.id,
            Self::Abort(m) => &m.id,
        }
    }

    #[must_use]
    pub const fn contact_group_id(&self) -> &GroupId {
        match self {
            Self::Invite(m) => &m.contact_group_id,
            Self::Join(m) | Self::Leave(m) => &m.contact_group_id,
            Self::Abort(m) => &m.contact_group_id,
        }
    }

    #[must_use]
    pub const fn private_group_id(&self) -> &GroupId {
        match self {
            Self::Invite(m) => &m.private_group_id,
            Self::Join(m) | Self::Leave(m) => &m.private_group_id,
            Self::Abort(m) => &m.private_group_id,
        }
    }

    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        match self {
            Self::Invite(m) => m.timestamp,
            Self::Join(m) | Self::Leave(m) => m.timestamp,
            Self::Abort(m) => m.timestamp,
        }
    }

    /// Returns the auto-delete timer, if the message carries one.
    #[must_use]
    pub const fn auto_delete_timer(&self) -> Option<i64> {
        match self {
            Self::Invite(m) => m.auto_delete_timer,
            Self::Join(m) | Self::Leave(m) => m.auto_delete_timer,
            Self::Abort(_) => None,
        }
    }
}
