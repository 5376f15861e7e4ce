//! CBOR encoding and decoding of protocol messages.
//!
//! Each body is a CBOR array whose first element is the type tag:
//!
//! ```text
//! INVITE = [0, [formatVersion, name, publicKey], groupName, salt, text | null, signature, timer?]
//! JOIN   = [1, privateGroupId, previousMessageId | null, timer?]
//! LEAVE  = [2, privateGroupId, previousMessageId | null, timer?]
//! ABORT  = [3, privateGroupId]
//! ```
//!
//! The trailing auto-delete timer is omitted entirely for contacts that do
//! not support auto-deletion. A decoder treats an absent and a `null` timer
//! the same way.

use ciborium::value::Value;

use super::error::{Result, WireError};
use super::group::PrivateGroup;
use super::limits::{
    GROUP_SALT_LENGTH, MAX_AUTO_DELETE_TIMER_MS, MAX_GROUP_INVITATION_TEXT_LENGTH,
    MAX_SIGNATURE_LENGTH, MIN_AUTO_DELETE_TIMER_MS, PUBLIC_KEY_LENGTH,
};
use super::message::{
    AbortMessage, InviteMessage, MembershipMessage, MessageType, ProtocolMessage, RawMessage,
};
use super::signing::verify_invitation;
use crate::identity::Author;
use crate::ids::{GroupId, MessageId, ID_LENGTH};

/// Serializes a CBOR value.
pub(crate) fn to_cbor(value: &Value) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| WireError::Cbor(e.to_string()))?;
    Ok(bytes)
}

/// Parses a single CBOR value.
pub(crate) fn from_cbor(bytes: &[u8]) -> Result<Value> {
    ciborium::de::from_reader::<Value, _>(bytes).map_err(|e| WireError::Cbor(e.to_string()))
}

// ==================== Encoding ====================

/// Encodes an invitation.
///
/// # Errors
///
/// Returns [`WireError::Length`] if the text, signature or timer is out of
/// bounds, or [`WireError::Cbor`] if serialization fails.
pub fn encode_invite(
    contact_group_id: GroupId,
    timestamp: i64,
    group: &PrivateGroup,
    text: Option<&str>,
    signature: &[u8],
    auto_delete_timer: Option<i64>,
) -> Result<RawMessage> {
    if let Some(text) = text {
        check_text(text)?;
    }
    check_signature(signature)?;
    let creator = group.creator();
    let mut items = vec![
        Value::Integer(MessageType::Invite.tag().into()),
        Value::Array(vec![
            Value::Integer(creator.format_version().into()),
            Value::Text(creator.name().to_string()),
            Value::Bytes(creator.public_key().to_vec()),
        ]),
        Value::Text(group.name().to_string()),
        Value::Bytes(group.salt().to_vec()),
        text.map_or(Value::Null, |t| Value::Text(t.to_string())),
        Value::Bytes(signature.to_vec()),
    ];
    push_timer(&mut items, auto_delete_timer)?;
    Ok(RawMessage::new(contact_group_id, timestamp, to_cbor(&Value::Array(items))?))
}

/// Encodes a join message.
///
/// # Errors
///
/// Returns [`WireError::Length`] if the timer is out of bounds, or
/// [`WireError::Cbor`] if serialization fails.
pub fn encode_join(
    contact_group_id: GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
    previous_message_id: Option<&MessageId>,
    auto_delete_timer: Option<i64>,
) -> Result<RawMessage> {
    encode_membership(
        MessageType::Join,
        contact_group_id,
        private_group_id,
        timestamp,
        previous_message_id,
        auto_delete_timer,
    )
}

/// Encodes a leave message.
///
/// # Errors
///
/// Returns [`WireError::Length`] if the timer is out of bounds, or
/// [`WireError::Cbor`] if serialization fails.
pub fn encode_leave(
    contact_group_id: GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
    previous_message_id: Option<&MessageId>,
    auto_delete_timer: Option<i64>,
) -> Result<RawMessage> {
    encode_membership(
        MessageType::Leave,
        contact_group_id,
        private_group_id,
        timestamp,
        previous_message_id,
        auto_delete_timer,
    )
}

/// Encodes an abort message.
///
/// # Errors
///
/// Returns [`WireError::Cbor`] if serialization fails.
pub fn encode_abort(
    contact_group_id: GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
) -> Result<RawMessage> {
    let body = to_cbor(&Value::Array(vec![
        Value::Integer(MessageType::Abort.tag().into()),
        Value::Bytes(private_group_id.as_bytes().to_vec()),
    ]))?;
    Ok(RawMessage::new(contact_group_id, timestamp, body))
}

fn encode_membership(
    message_type: MessageType,
    contact_group_id: GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
    previous_message_id: Option<&MessageId>,
    auto_delete_timer: Option<i64>,
) -> Result<RawMessage> {
    let mut items = vec![
        Value::Integer(message_type.tag().into()),
        Value::Bytes(private_group_id.as_bytes().to_vec()),
        previous_message_id.map_or(Value::Null, |id| Value::Bytes(id.as_bytes().to_vec())),
    ];
    push_timer(&mut items, auto_delete_timer)?;
    Ok(RawMessage::new(contact_group_id, timestamp, to_cbor(&Value::Array(items))?))
}

fn push_timer(items: &mut Vec<Value>, auto_delete_timer: Option<i64>) -> Result<()> {
    if let Some(timer) = auto_delete_timer {
        check_timer(timer)?;
        items.push(Value::Integer(timer.into()));
    }
    Ok(())
}

// ==================== Decoding ====================

/// Reads only the type tag of a message body.
///
/// # Errors
///
/// Returns an error if the body is not a CBOR array with a known tag.
pub fn peek_type(body: &[u8]) -> Result<MessageType> {
    let value = from_cbor(body)?;
    let items = as_array(&value, "body")?;
    read_type(items)
}

/// Decodes and validates a message.
///
/// For invitations the private group id is derived from the embedded
/// descriptor and the creator's signature is verified.
///
/// # Errors
///
/// - [`WireError::Cbor`] or [`WireError::Format`] if the body is malformed
/// - [`WireError::UnknownMessageType`] for an unknown tag
/// - [`WireError::Length`] if a field violates a bound
/// - [`WireError::Signature`] if an invitation signature does not verify
pub fn decode(raw: &RawMessage) -> Result<ProtocolMessage> {
    let value = from_cbor(&raw.body)?;
    let items = as_array(&value, "body")?;
    match read_type(items)? {
        MessageType::Invite => decode_invite(raw, items).map(ProtocolMessage::Invite),
        MessageType::Join => decode_membership(raw, items).map(ProtocolMessage::Join),
        MessageType::Leave => decode_membership(raw, items).map(ProtocolMessage::Leave),
        MessageType::Abort => decode_abort(raw, items).map(ProtocolMessage::Abort),
    }
}

fn read_type(items: &[Value]) -> Result<MessageType> {
    let first = items
        .first()
        .ok_or_else(|| WireError::Format("empty message".to_string()))?;
    let tag = as_int(first, "type")?;
    MessageType::from_tag(tag).ok_or(WireError::UnknownMessageType(tag))
}

fn decode_invite(raw: &RawMessage, items: &[Value]) -> Result<InviteMessage> {
    check_field_count(items, 6, 7)?;

    let author_fields = as_array(&items[1], "creator")?;
    if author_fields.len() != 3 {
        return Err(WireError::Format(format!(
            "creator has {} fields, expected 3",
            author_fields.len()
        )));
    }
    let format_version = u8::try_from(as_int(&author_fields[0], "format version")?)
        .map_err(|_| WireError::Format("format version out of range".to_string()))?;
    let author_name = as_text(&author_fields[1], "author name")?;
    let public_key: [u8; PUBLIC_KEY_LENGTH] = as_bytes(&author_fields[2], "public key")?
        .try_into()
        .map_err(|_| WireError::Length("public key".to_string()))?;
    let creator = Author::with_format_version(format_version, author_name, public_key)
        .map_err(|e| WireError::Format(e.to_string()))?;

    let group_name = as_text(&items[2], "group name")?;
    let salt: [u8; GROUP_SALT_LENGTH] = as_bytes(&items[3], "salt")?
        .try_into()
        .map_err(|_| WireError::Length(format!("salt must be {GROUP_SALT_LENGTH} bytes")))?;
    let text = if items[4].is_null() {
        None
    } else {
        let text = as_text(&items[4], "text")?;
        check_text(text)?;
        Some(text.to_string())
    };
    let signature = as_bytes(&items[5], "signature")?;
    check_signature(signature)?;
    let auto_delete_timer = read_timer(items, 6)?;

    let group = PrivateGroup::new(group_name, creator, salt)?;
    verify_invitation(
        group.creator(),
        &raw.contact_group_id,
        group.id(),
        raw.timestamp,
        signature,
    )?;

    Ok(InviteMessage {
        id: raw.id,
        contact_group_id: raw.contact_group_id,
        private_group_id: *group.id(),
        timestamp: raw.timestamp,
        group_name: group.name().to_string(),
        creator: group.creator().clone(),
        salt,
        text,
        signature: signature.to_vec(),
        auto_delete_timer,
    })
}

fn decode_membership(raw: &RawMessage, items: &[Value]) -> Result<MembershipMessage> {
    check_field_count(items, 3, 4)?;
    let private_group_id = read_group_id(&items[1])?;
    let previous_message_id = if items[2].is_null() {
        None
    } else {
        Some(
            MessageId::from_slice(as_bytes(&items[2], "previous message id")?)
                .ok_or_else(|| WireError::Length(format!("message id must be {ID_LENGTH} bytes")))?,
        )
    };
    let auto_delete_timer = read_timer(items, 3)?;
    Ok(MembershipMessage {
        id: raw.id,
        contact_group_id: raw.contact_group_id,
        private_group_id,
        timestamp: raw.timestamp,
        previous_message_id,
        auto_delete_timer,
    })
}

fn decode_abort(raw: &RawMessage, items: &[Value]) -> Result<AbortMessage> {
    check_field_count(items, 2, 2)?;
    Ok(AbortMessage {
        id: raw.id,
        contact_group_id: raw.contact_group_id,
        private_group_id: read_group_id(&items[1])?,
        timestamp: raw.timestamp,
    })
}

// ==================== Field Helpers ====================

fn check_field_count(items: &[Value], min: usize, max: usize) -> Result<()> {
    if items.len() < min || items.len() > max {
        return Err(WireError::Format(format!(
            "{} fields, expected {min}..={max}",
            items.len()
        )));
    }
    Ok(())
}

fn check_text(text: &str) -> Result<()> {
    if text.is_empty() || text.len() > MAX_GROUP_INVITATION_TEXT_LENGTH {
        return Err(WireError::Length(format!(
            "text length {} not in 1..={MAX_GROUP_INVITATION_TEXT_LENGTH}",
            text.len()
        )));
    }
    Ok(())
}

fn check_signature(signature: &[u8]) -> Result<()> {
    if signature.is_empty() || signature.len() > MAX_SIGNATURE_LENGTH {
        return Err(WireError::Length(format!(
            "signature length {} not in 1..={MAX_SIGNATURE_LENGTH}",
            signature.len()
        )));
    }
    Ok(())
}

fn check_timer(timer: i64) -> Result<()> {
    if !(MIN_AUTO_DELETE_TIMER_MS..=MAX_AUTO_DELETE_TIMER_MS).contains(&timer) {
        return Err(WireError::Length(format!("auto-delete timer {timer} out of range")));
    }
    Ok(())
}

fn read_timer(items: &[Value], index: usize) -> Result<Option<i64>> {
    match items.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let timer = i64::try_from(as_int(value, "auto-delete timer")?)
                .map_err(|_| WireError::Length("auto-delete timer out of range".to_string()))?;
            check_timer(timer)?;
            Ok(Some(timer))
        }
    }
}

fn read_group_id(value: &Value) -> Result<GroupId> {
    GroupId::from_slice(as_bytes(value, "private group id")?)
        .ok_or_else(|| WireError::Length(format!("group id must be {ID_LENGTH} bytes")))
}

pub(crate) fn as_array<'a>(value: &'a Value, field: &str) -> Result<&'a [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| WireError::Format(format!("{field}: expected array")))
}

pub(crate) fn as_int(value: &Value, field: &str) -> Result<i128> {
    value
        .as_integer()
        .map(i128::from)
        .ok_or_else(|| WireError::Format(format!("{field}: expected integer")))
}

pub(crate) fn as_bytes<'a>(value: &'a Value, field: &str) -> Result<&'a [u8]> {
    value
        .as_bytes()
        .map(Vec::as_slice)
        .ok_or_else(|| WireError::Format(format!("{field}: expected bytes")))
}

fn as_text<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .as_text()
        .ok_or_else(|| WireError::Format(format!("{field}: expected text")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalAuthor;
    use crate::wire::signing::sign_invitation;

    const TIMER: i64 = 7 * 24 * 60 * 60 * 1000;

    fn setup() -> (LocalAuthor, PrivateGroup, GroupId) {
        let creator = LocalAuthor::generate("carol").unwrap();
        let group = PrivateGroup::new("garden", creator.author().clone(), [4; 32]).unwrap();
        (creator, group, GroupId::from_bytes([8; 32]))
    }

    fn invite(timer: Option<i64>) -> (RawMessage, PrivateGroup) {
        let (creator, group, cg) = setup();
        let sig = sign_invitation(&creator, &cg, group.id(), 1_000).unwrap();
        let raw = encode_invite(cg, 1_000, &group, Some("come along"), &sig, timer).unwrap();
        (raw, group)
    }

    #[test]
    fn invite_roundtrip_with_and_without_timer() {
        for timer in [None, Some(TIMER)] {
            let (raw, group) = invite(timer);
            let ProtocolMessage::Invite(m) = decode(&raw).unwrap() else {
                panic!("expected invite");
            };
            assert_eq!(m.private_group_id, *group.id());
            assert_eq!(m.group_name, "garden");
            assert_eq!(&m.creator, group.creator());
            assert_eq!(m.text.as_deref(), Some("come along"));
            assert_eq!(m.auto_delete_timer, timer);
            assert_eq!(m.timestamp, 1_000);
        }
    }

    #[test]
    fn legacy_invite_omits_trailing_field() {
        let (with_timer, _) = invite(Some(TIMER));
        let (legacy, _) = invite(None);
        let count = |raw: &RawMessage| from_cbor(&raw.body).unwrap().as_array().unwrap().len();
        assert_eq!(count(&with_timer), 7);
        assert_eq!(count(&legacy), 6);
    }

    #[test]
    fn null_timer_decodes_as_absent() {
        let pg = GroupId::from_bytes([1; 32]);
        let body = to_cbor(&Value::Array(vec![
            Value::Integer(1.into()),
            Value::Bytes(pg.as_bytes().to_vec()),
            Value::Null,
            Value::Null,
        ]))
        .unwrap();
        let raw = RawMessage::new(GroupId::from_bytes([2; 32]), 5, body);
        let ProtocolMessage::Join(m) = decode(&raw).unwrap() else {
            panic!("expected join");
        };
        assert_eq!(m.auto_delete_timer, None);
        assert_eq!(m.previous_message_id, None);
    }

    #[test]
    fn tampered_invite_fails_signature() {
        let (creator, group, cg) = setup();
        let sig = sign_invitation(&creator, &cg, group.id(), 1_000).unwrap();
        // Signed for timestamp 1000 but sent with 2000.
        let raw = encode_invite(cg, 2_000, &group, None, &sig, None).unwrap();
        assert!(matches!(decode(&raw), Err(WireError::Signature(_))));
    }

    #[test]
    fn invite_for_other_contact_fails_signature() {
        let (creator, group, cg) = setup();
        let sig = sign_invitation(&creator, &cg, group.id(), 1_000).unwrap();
        let raw =
            encode_invite(GroupId::from_bytes([9; 32]), 1_000, &group, None, &sig, None).unwrap();
        assert!(matches!(decode(&raw), Err(WireError::Signature(_))));
    }

    #[test]
    fn join_leave_roundtrip() {
        let cg = GroupId::from_bytes([2; 32]);
        let pg = GroupId::from_bytes([3; 32]);
        let prev = MessageId::from_bytes([4; 32]);
        let raw = encode_leave(cg, &pg, 77, Some(&prev), Some(TIMER)).unwrap();
        let ProtocolMessage::Leave(m) = decode(&raw).unwrap() else {
            panic!("expected leave");
        };
        assert_eq!(m.private_group_id, pg);
        assert_eq!(m.previous_message_id, Some(prev));
        assert_eq!(m.auto_delete_timer, Some(TIMER));
        assert_eq!(m.id, raw.id);

        let raw = encode_join(cg, &pg, 78, None, None).unwrap();
        assert!(matches!(decode(&raw).unwrap(), ProtocolMessage::Join(_)));
    }

    #[test]
    fn abort_requires_exactly_two_fields() {
        let pg = GroupId::from_bytes([3; 32]);
        let raw = encode_abort(GroupId::from_bytes([2; 32]), &pg, 1).unwrap();
        assert!(matches!(decode(&raw).unwrap(), ProtocolMessage::Abort(_)));

        let body = to_cbor(&Value::Array(vec![
            Value::Integer(3.into()),
            Value::Bytes(pg.as_bytes().to_vec()),
            Value::Null,
        ]))
        .unwrap();
        let raw = RawMessage::new(GroupId::from_bytes([2; 32]), 1, body);
        assert!(matches!(decode(&raw), Err(WireError::Format(_))));
    }

    #[test]
    fn unknown_tag_rejected() {
        let body = to_cbor(&Value::Array(vec![Value::Integer(9.into())])).unwrap();
        let raw = RawMessage::new(GroupId::from_bytes([2; 32]), 1, body);
        assert!(matches!(decode(&raw), Err(WireError::UnknownMessageType(9))));
    }

    #[test]
    fn garbage_rejected() {
        let raw = RawMessage::new(GroupId::from_bytes([2; 32]), 1, vec![0xff, 0x00, 0x13]);
        assert!(decode(&raw).is_err());
    }

    #[test]
    fn bounds_enforced_on_encode() {
        let (creator, group, cg) = setup();
        let sig = sign_invitation(&creator, &cg, group.id(), 1).unwrap();
        let long = "x".repeat(MAX_GROUP_INVITATION_TEXT_LENGTH + 1);
        assert!(matches!(
            encode_invite(cg, 1, &group, Some(&long), &sig, None),
            Err(WireError::Length(_))
        ));
        assert!(matches!(
            encode_invite(cg, 1, &group, Some(""), &sig, None),
            Err(WireError::Length(_))
        ));
        assert!(matches!(
            encode_join(cg, group.id(), 1, None, Some(10)),
            Err(WireError::Length(_))
        ));
    }

    #[test]
    fn short_group_id_rejected() {
        let body = to_cbor(&Value::Array(vec![
            Value::Integer(2.into()),
            Value::Bytes(vec![1; 31]),
            Value::Null,
        ]))
        .unwrap();
        let raw = RawMessage::new(GroupId::from_bytes([2; 32]), 1, body);
        assert!(matches!(decode(&raw), Err(WireError::Length(_))));
    }

    #[test]
    fn peek_reads_tag_only() {
        let raw = encode_abort(GroupId::from_bytes([2; 32]), &GroupId::from_bytes([3; 32]), 1).unwrap();
        assert_eq!(peek_type(&raw.body).unwrap(), MessageType::Abort);
    }
}
