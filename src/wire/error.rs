//! Errors raised while encoding or decoding protocol messages.

use thiserror::Error;

/// Error type for the wire codec.
///
/// Any of these rejects a message before it reaches a session.
#[derive(Error, Debug)]
pub enum WireError {
    /// The message body does not have the expected shape.
    #[error("Format error: {0}")]
    Format(String),

    /// A field violates a documented length or range bound.
    #[error("Length error: {0}")]
    Length(String),

    /// The invitation signature did not verify.
    #[error("Signature error: {0}")]
    Signature(String),

    /// The leading type tag is not a known message type.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(i128),

    /// CBOR serialization or parsing failed.
    #[error("CBOR error: {0}")]
    Cbor(String),
}

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
