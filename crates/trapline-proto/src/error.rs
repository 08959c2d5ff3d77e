//! Errors raised while sizing, encoding, decoding, or parsing wire messages.

use thiserror::Error;

/// Errors raised while sizing, encoding, decoding, or parsing a wire message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A schema field referenced a size-expression variable the environment
    /// doesn't have an entry for.
    #[error("size expression references unbound parameter {name}")]
    UnboundParameter { name: &'static str },

    /// A variable-width message kind was used before the handshake bound
    /// the environment.
    #[error("codec table has not been bound to a handshake environment yet")]
    NotYetBound,

    /// A tag byte doesn't correspond to any known message kind.
    #[error("unknown message tag {tag}")]
    UnknownTag { tag: u8 },

    /// A buffer was shorter than the payload a tag promised.
    #[error("frame for tag {tag} truncated: need {needed} bytes, have {available}")]
    FrameTruncated { tag: u8, needed: usize, available: usize },

    /// The decoded byte count didn't match the schema's expected size.
    #[error("payload size mismatch for tag {tag}: expected {expected}, got {actual}")]
    PayloadSizeMismatch { tag: u8, expected: usize, actual: usize },

    /// A decoded discriminant (status flag, homing phase, ...) had no
    /// matching enum variant.
    #[error("unknown enum discriminant {value} for {type_name}")]
    UnknownVariant { type_name: &'static str, value: u32 },

    /// The device's `Describe.version` did not match [`crate::messages::PROTOCOL_VERSION`].
    #[error("device speaks protocol version {found}, this crate supports {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    /// A record's `from_fields` received a [`crate::schema::FieldValue`] of
    /// the wrong shape for its position in the schema. Unreachable through
    /// [`crate::schema::Codec::decode_fields`]'s own call patterns (it
    /// always produces values matching the schema that built it); kept
    /// typed rather than panicking.
    #[error("field values for {record} don't match its declared schema")]
    SchemaMismatch { record: &'static str },
}
