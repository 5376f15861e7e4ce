//! Persistent session records.
//!
//! A record is a CBOR array with a leading schema version:
//!
//! ```text
//! [version, role, state, privateGroupId, lastLocal | null, lastRemote | null, localTimestamp, inviteTimestamp]
//! ```
//!
//! The contact group id is not part of the record; it is the storage key.

use ciborium::value::Value;
use thiserror::Error;

use super::model::{AnySession, Session};
use super::state::{Role, State};
use crate::ids::{GroupId, MessageId};
use crate::wire::codec::{as_array, as_bytes, as_int, from_cbor, to_cbor};
use crate::wire::WireError;

/// Current session record schema version.
pub const SESSION_RECORD_VERSION: u8 = 1;

const RECORD_FIELDS: usize = 8;

/// Error decoding or encoding a session record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record encoding failed: {0}")]
    Encoding(#[from] WireError),

    #[error("Unsupported record version: {0}")]
    Version(i128),

    #[error("Invalid record field: {0}")]
    Field(String),
}

/// Serializes a session to its record bytes.
///
/// # Errors
///
/// Returns an error if CBOR serialization fails.
pub fn encode_session(session: &AnySession) -> Result<Vec<u8>, RecordError> {
    let id_value =
        |id: Option<MessageId>| id.map_or(Value::Null, |id| Value::Bytes(id.as_bytes().to_vec()));
    let record = Value::Array(vec![
        Value::Integer(SESSION_RECORD_VERSION.into()),
        Value::Integer(session.role().value().into()),
        Value::Integer(session.state_value().into()),
        Value::Bytes(session.private_group_id().as_bytes().to_vec()),
        id_value(session.last_local_message_id()),
        id_value(session.last_remote_message_id()),
        Value::Integer(session.local_timestamp().into()),
        Value::Integer(session.invite_timestamp().into()),
    ]);
    Ok(to_cbor(&record)?)
}

/// Restores a session from record bytes stored under `contact_group_id`.
///
/// # Errors
///
/// Returns an error if the record is malformed or of an unknown version.
pub fn decode_session(contact_group_id: GroupId, bytes: &[u8]) -> Result<AnySession, RecordError> {
    let value = from_cbor(bytes)?;
    let fields = as_array(&value, "record")?;
    let version = fields
        .first()
        .map(|v| as_int(v, "version"))
        .transpose()?
        .ok_or_else(|| RecordError::Field("empty record".to_string()))?;
    if version != i128::from(SESSION_RECORD_VERSION) {
        return Err(RecordError::Version(version));
    }
    if fields.len() != RECORD_FIELDS {
        return Err(RecordError::Field(format!(
            "{} fields, expected {RECORD_FIELDS}",
            fields.len()
        )));
    }

    let role = small_int(&fields[1], "role")
        .and_then(|v| Role::from_value(v).ok_or_else(|| RecordError::Field(format!("role {v}"))))?;
    let state = small_int(&fields[2], "state")?;
    let private_group_id = GroupId::from_slice(as_bytes(&fields[3], "private group id")?)
        .ok_or_else(|| RecordError::Field("private group id length".to_string()))?;
    let last_local_message_id = optional_id(&fields[4], "last local message id")?;
    let last_remote_message_id = optional_id(&fields[5], "last remote message id")?;
    let local_timestamp = timestamp(&fields[6], "local timestamp")?;
    let invite_timestamp = timestamp(&fields[7], "invite timestamp")?;

    let fields = RecordFields {
        contact_group_id,
        private_group_id,
        last_local_message_id,
        last_remote_message_id,
        local_timestamp,
        invite_timestamp,
    };
    Ok(match role {
        Role::Creator => AnySession::Creator(fields.into_session(state)?),
        Role::Invitee => AnySession::Invitee(fields.into_session(state)?),
        Role::Peer => AnySession::Peer(fields.into_session(state)?),
    })
}

struct RecordFields {
    contact_group_id: GroupId,
    private_group_id: GroupId,
    last_local_message_id: Option<MessageId>,
    last_remote_message_id: Option<MessageId>,
    local_timestamp: i64,
    invite_timestamp: i64,
}

impl RecordFields {
    fn into_session<S: State>(self, state: u8) -> Result<Session<S>, RecordError> {
        let state = S::from_value(state).ok_or_else(|| {
            RecordError::Field(format!("state {state} for role {}", S::ROLE.as_str()))
        })?;
        Ok(Session {
            contact_group_id: self.contact_group_id,
            private_group_id: self.private_group_id,
            last_local_message_id: self.last_local_message_id,
            last_remote_message_id: self.last_remote_message_id,
            local_timestamp: self.local_timestamp,
            invite_timestamp: self.invite_timestamp,
            state,
        })
    }
}

fn small_int(value: &Value, field: &str) -> Result<u8, RecordError> {
    u8::try_from(as_int(value, field)?).map_err(|_| RecordError::Field(field.to_string()))
}

fn timestamp(value: &Value, field: &str) -> Result<i64, RecordError> {
    i64::try_from(as_int(value, field)?).map_err(|_| RecordError::Field(field.to_string()))
}

fn optional_id(value: &Value, field: &str) -> Result<Option<MessageId>, RecordError> {
    if value.is_null() {
        return Ok(None);
    }
    MessageId::from_slice(as_bytes(value, field)?)
        .map(Some)
        .ok_or_else(|| RecordError::Field(field.to_string()))
}
