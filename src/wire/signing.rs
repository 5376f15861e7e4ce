//! Invitation signatures.
//!
//! The creator signs `(timestamp, contact_group_id, private_group_id)`, which
//! binds an invitation to one contact, one group and one moment. A signature
//! captured from one contact's invitation cannot be replayed to another
//! contact or for another group.

use ciborium::value::Value;

use super::codec::to_cbor;
use super::error::{Result, WireError};
use crate::identity::{Author, LocalAuthor};
use crate::ids::GroupId;

/// Domain-separation label for invitation signatures.
pub const SIGNING_LABEL_INVITE: &str = "covey.group-invitation/INVITE";

/// Builds the signed payload of an invitation.
///
/// # Errors
///
/// Returns [`WireError::Cbor`] if serialization fails.
pub fn invite_signature_payload(
    timestamp: i64,
    contact_group_id: &GroupId,
    private_group_id: &GroupId,
) -> Result<Vec<u8>> {
    to_cbor(&Value::Array(vec![
        Value::Integer(timestamp.into()),
        Value::Bytes(contact_group_id.as_bytes().to_vec()),
        Value::Bytes(private_group_id.as_bytes().to_vec()),
    ]))
}

/// Signs an invitation as the group creator.
///
/// # Errors
///
/// Returns [`WireError::Cbor`] if the payload cannot be serialized.
pub fn sign_invitation(
    creator: &LocalAuthor,
    contact_group_id: &GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
) -> Result<Vec<u8>> {
    let payload = invite_signature_payload(timestamp, contact_group_id, private_group_id)?;
    Ok(creator.sign(SIGNING_LABEL_INVITE, &payload))
}

/// Verifies an invitation signature against the creator's public key.
///
/// # Errors
///
/// Returns [`WireError::Signature`] if verification fails.
pub fn verify_invitation(
    creator: &Author,
    contact_group_id: &GroupId,
    private_group_id: &GroupId,
    timestamp: i64,
    signature: &[u8],
) -> Result<()> {
    let payload = invite_signature_payload(timestamp, contact_group_id, private_group_id)?;
    creator
        .verify(SIGNING_LABEL_INVITE, &payload, signature)
        .map_err(|e| WireError::Signature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_binds_all_fields() {
        let creator = LocalAuthor::generate("carol").unwrap();
        let cg = GroupId::from_bytes([1; 32]);
        let pg = GroupId::from_bytes([2; 32]);
        let sig = sign_invitation(&creator, &cg, &pg, 1_000).unwrap();

        assert!(verify_invitation(creator.author(), &cg, &pg, 1_000, &sig).is_ok());
        assert!(verify_invitation(creator.author(), &cg, &pg, 1_001, &sig).is_err());
        assert!(verify_invitation(creator.author(), &pg, &cg, 1_000, &sig).is_err());
        assert!(
            verify_invitation(creator.author(), &GroupId::from_bytes([3; 32]), &pg, 1_000, &sig)
                .is_err()
        );
    }

    #[test]
    fn truncated_signature_rejected() {
        let creator = LocalAuthor::generate("carol").unwrap();
        let cg = GroupId::from_bytes([1; 32]);
        let pg = GroupId::from_bytes([2; 32]);
        let sig = sign_invitation(&creator, &cg, &pg, 5).unwrap();
        let result = verify_invitation(creator.author(), &cg, &pg, 5, &sig[..63]);
        assert!(matches!(result, Err(WireError::Signature(_))));
    }
}
