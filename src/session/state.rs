//! Roles, per-role states and the visibility each state implies.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Which side of an invitation the local user is on for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the private group and invites the contact.
    Creator,
    /// Was invited to the group by the contact.
    Invitee,
    /// Already a member, as is the contact.
    Peer,
}

impl Role {
    /// Converts to string representation for storage and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Invitee => "invitee",
            Self::Peer => "peer",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creator" => Some(Self::Creator),
            "invitee" => Some(Self::Invitee),
            "peer" => Some(Self::Peer),
            _ => None,
        }
    }

    /// Numeric value used in session records.
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::Creator => 0,
            Self::Invitee => 1,
            Self::Peer => 2,
        }
    }

    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Creator),
            1 => Some(Self::Invitee),
            2 => Some(Self::Peer),
            _ => None,
        }
    }
}

/// How a private group is exposed to one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// The contact is not told about the group.
    #[default]
    Invisible,
    /// The contact may see we are a member, but does not share the group yet.
    Visible,
    /// Group content is shared with the contact.
    Shared,
}

impl Visibility {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invisible => "invisible",
            Self::Visible => "visible",
            Self::Shared => "shared",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invisible" => Some(Self::Invisible),
            "visible" => Some(Self::Visible),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Behavior shared by the three per-role state enums.
pub trait State: Copy + Eq + Debug + Send + Sync + 'static {
    /// The role this state belongs to.
    const ROLE: Role;

    /// The initial state of a new session.
    fn start() -> Self;

    /// The terminal error state.
    fn error() -> Self;

    /// Numeric value used in session records.
    fn value(&self) -> u8;

    /// Inverse of [`State::value`].
    fn from_value(value: u8) -> Option<Self>;

    /// Visibility of the private group to the contact in this state.
    fn visibility(&self) -> Visibility;

    /// Whether one side is still waiting for the other to answer an invitation.
    fn is_awaiting_response(&self) -> bool;
}

/// States of a session where we created the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatorState {
    Start,
    Invited,
    Joined,
    Left,
    Dissolved,
    Error,
}

impl State for CreatorState {
    const ROLE: Role = Role::Creator;

    fn start() -> Self {
        Self::Start
    }

    fn error() -> Self {
        Self::Error
    }

    fn value(&self) -> u8 {
        match self {
            Self::Start => 0,
            Self::Invited => 1,
            Self::Joined => 2,
            Self::Left => 3,
            Self::Dissolved => 4,
            Self::Error => 5,
        }
    }

    fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::Invited),
            2 => Some(Self::Joined),
            3 => Some(Self::Left),
            4 => Some(Self::Dissolved),
            5 => Some(Self::Error),
            _ => None,
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            Self::Joined => Visibility::Shared,
            Self::Start | Self::Invited | Self::Left | Self::Dissolved | Self::Error => {
                Visibility::Invisible
            }
        }
    }

    fn is_awaiting_response(&self) -> bool {
        matches!(self, Self::Invited)
    }
}

/// States of a session where the contact invited us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteeState {
    Start,
    Invited,
    Accepted,
    Joined,
    Left,
    Dissolved,
    Error,
}

impl State for InviteeState {
    const ROLE: Role = Role::Invitee;

    fn start() -> Self {
        Self::Start
    }

    fn error() -> Self {
        Self::Error
    }

    fn value(&self) -> u8 {
        match self {
            Self::Start => 0,
            Self::Invited => 1,
            Self::Accepted => 2,
            Self::Joined => 3,
            Self::Left => 4,
            Self::Dissolved => 5,
            Self::Error => 6,
        }
    }

    fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::Invited),
            2 => Some(Self::Accepted),
            3 => Some(Self::Joined),
            4 => Some(Self::Left),
            5 => Some(Self::Dissolved),
            6 => Some(Self::Error),
            _ => None,
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            Self::Accepted => Visibility::Visible,
            Self::Joined => Visibility::Shared,
            Self::Start | Self::Invited | Self::Left | Self::Dissolved | Self::Error => {
                Visibility::Invisible
            }
        }
    }

    fn is_awaiting_response(&self) -> bool {
        matches!(self, Self::Invited)
    }
}

/// States of a session between two members of the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    /// Neither side has learned of the other's membership.
    Start,
    /// The contact announced membership before we learned they were added.
    AwaitMember,
    NeitherJoined,
    LocalJoined,
    BothJoined,
    LocalLeft,
    Error,
}

impl State for PeerState {
    const ROLE: Role = Role::Peer;

    fn start() -> Self {
        Self::Start
    }

    fn error() -> Self {
        Self::Error
    }

    fn value(&self) -> u8 {
        match self {
            Self::Start => 0,
            Self::AwaitMember => 1,
            Self::NeitherJoined => 2,
            Self::LocalJoined => 3,
            Self::BothJoined => 4,
            Self::LocalLeft => 5,
            Self::Error => 6,
        }
    }

    fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::AwaitMember),
            2 => Some(Self::NeitherJoined),
            3 => Some(Self::LocalJoined),
            4 => Some(Self::BothJoined),
            5 => Some(Self::LocalLeft),
            6 => Some(Self::Error),
            _ => None,
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            Self::LocalJoined => Visibility::Visible,
            Self::BothJoined => Visibility::Shared,
            Self::Start
            | Self::AwaitMember
            | Self::NeitherJoined
            | Self::LocalLeft
            | Self::Error => Visibility::Invisible,
        }
    }

    fn is_awaiting_response(&self) -> bool {
        false
    }
}
