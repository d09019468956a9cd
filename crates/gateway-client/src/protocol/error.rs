//! Envelope decoding errors

use gateway_core::{ConversionError, DecodeError};

/// Errors turning a frame into a [`Payload`](super::Payload)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("Envelope must be a map, got {0}")]
    NotAMap(&'static str),

    #[error("Envelope is missing `{0}`")]
    MissingField(&'static str),

    #[error("Envelope field `{field}` is invalid: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: ConversionError,
    },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),
}

impl ProtocolError {
    /// Check if the frame ended early
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Decode(e) if e.is_truncated())
    }

    /// Check if the envelope was well formed but carried an opcode we do not know
    #[must_use]
    pub fn is_unknown_opcode(&self) -> bool {
        matches!(self, Self::UnknownOpcode(_))
    }
}
