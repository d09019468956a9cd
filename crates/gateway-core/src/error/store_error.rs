//! Store errors - failures raised while applying gateway objects to the session store

use crate::etf::ConversionError;
use thiserror::Error;

/// Session store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} is missing field `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} has an invalid `{field}`: {source}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        #[source]
        source: ConversionError,
    },

    #[error("expected {0} to be a map")]
    NotAMap(&'static str),
}

impl StoreError {
    /// Check if this error is caused by an absent field
    #[must_use]
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}
