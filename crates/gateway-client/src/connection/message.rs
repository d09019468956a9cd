//! Frames moving between the socket loops and handlers

use tokio_util::sync::CancellationToken;

/// Frame encoding of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
}

impl FrameKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// One frame read from or queued for the socket
///
/// The bytes are owned by the message; they never alias a read buffer.
#[derive(Debug, Clone)]
pub struct Message {
    /// Cancelled when the connection shuts down
    pub scope: CancellationToken,
    pub kind: FrameKind,
    pub bytes: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn new(scope: CancellationToken, kind: FrameKind, bytes: Vec<u8>) -> Self {
        Self { scope, kind, bytes }
    }

    #[must_use]
    pub fn binary(scope: CancellationToken, bytes: Vec<u8>) -> Self {
        Self::new(scope, FrameKind::Binary, bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
