//! Handler error types

use crate::connection::SendError;
use crate::protocol::{CloseCode, ProtocolError};
use crate::ratelimit::RateLimitError;
use gateway_core::{ConversionError, StoreError};
use thiserror::Error;

/// Handler error type
///
/// Contained per message: the pool logs it and the connection keeps running.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame could not be turned into a payload
    #[error("Invalid payload: {0}")]
    Protocol(#[from] ProtocolError),

    /// A payload field had the wrong kind or range
    #[error("Invalid field: {0}")]
    Conversion(#[from] ConversionError),

    /// The server sent settings the client cannot use
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Enqueueing a reply failed
    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// Applying an event to the session store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The message scope ended before the handler ran
    #[error("Handler cancelled")]
    Cancelled,

    /// The handler panicked; the message is dropped
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Check if the error only reflects shutdown
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::RateLimit(RateLimitError::Cancelled) => true,
            Self::Send(e) => e.is_cancelled() || *e == SendError::Closed,
            _ => false,
        }
    }

    /// Close code the server would use for the equivalent failure, if any
    #[must_use]
    pub fn to_close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Protocol(ProtocolError::UnknownOpcode(_)) => Some(CloseCode::UnknownOpcode),
            Self::Protocol(_) | Self::Conversion(_) => Some(CloseCode::DecodeError),
            _ => None,
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
