//! Transport errors

use crate::protocol::CloseCode;
use tokio_tungstenite::tungstenite;

/// Fatal connection errors returned by [`Transport`](super::Transport)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The gateway URL or token could not be turned into a request
    #[error("Invalid gateway request: {0}")]
    InvalidRequest(String),

    /// Opening the socket or the WebSocket handshake failed
    #[error("Dial failed: {0}")]
    Dial(#[source] tungstenite::Error),

    /// Reading from the socket failed
    #[error("Read failed: {0}")]
    Read(#[source] tungstenite::Error),

    /// The remote side closed the connection
    #[error("Connection closed by peer (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    /// The run scope was cancelled; not a failure
    #[error("Shutdown requested")]
    ShutdownRequested,

    /// `run` was called before a message handler was installed
    #[error("No message handler installed")]
    NoHandler,
}

impl TransportError {
    /// Gateway close code carried by a peer close, if any
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Closed { code: Some(code), .. } => CloseCode::from_u16(*code),
            _ => None,
        }
    }

    /// Whether dialing again could succeed
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        match self {
            Self::Closed { code: Some(code), .. } => {
                CloseCode::from_u16(*code).map_or(true, CloseCode::should_reconnect)
            }
            Self::Closed { code: None, .. } | Self::Read(_) | Self::Dial(_) => true,
            Self::InvalidRequest(_) | Self::ShutdownRequested | Self::NoHandler => false,
        }
    }

    /// Check if this is the clean-shutdown marker
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownRequested)
    }
}
