//! Codec errors

use thiserror::Error;

/// Errors produced while decoding a binary term
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported format version: {0}")]
    MissingVersion(u8),

    #[error("unknown term tag: {0}")]
    UnknownTag(u8),

    #[error("input truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("binary is not valid UTF-8")]
    InvalidUtf8,

    #[error("map key must be a string or atom, found {0}")]
    InvalidMapKey(&'static str),

    #[error("list is not terminated by nil")]
    ImproperList,

    #[error("big integer does not fit in 128 bits")]
    IntegerOverflow,

    #[error("term nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("{0} trailing bytes after term")]
    TrailingBytes(usize),
}

impl DecodeError {
    /// Whether the input ended before a declared length was satisfied
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// Errors produced by the typed accessors on [`Element`](super::Element)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("expected an integer, found {0}")]
    NotAnInteger(&'static str),

    #[error("integer {value} does not fit in {target}")]
    Overflow { value: i128, target: &'static str },

    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: &'static str,
    },
}
