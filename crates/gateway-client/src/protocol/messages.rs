//! Gateway payload envelope
//!
//! Every frame carries one map `{op, d, s?, t?}` encoded as a binary term.

use super::{IdentifyPayload, OpCode, ProtocolError, ResumePayload};
use gateway_core::{Element, ElementMap};

/// Gateway payload
///
/// All messages sent over the WebSocket connection follow this format.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Operation code
    pub op: OpCode,

    /// Sequence number (only for op=0 Dispatch)
    pub sequence: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    pub event_name: Option<String>,

    /// Event data; a map for every payload except heartbeats and invalid-session
    pub data: Element,
}

impl Payload {
    /// Create a payload with no sequence or event name
    #[must_use]
    pub fn new(op: OpCode, data: impl Into<Element>) -> Self {
        Self {
            op,
            sequence: None,
            event_name: None,
            data: data.into(),
        }
    }

    // === Receive-side payloads ===

    /// Create a Dispatch payload (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: impl Into<Element>) -> Self {
        Self {
            op: OpCode::Dispatch,
            sequence: Some(sequence),
            event_name: Some(event_name.into()),
            data: data.into(),
        }
    }

    /// Create a Hello payload (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::new(
            OpCode::Hello,
            super::HelloPayload::with_interval(heartbeat_interval).to_element(),
        )
    }

    /// Create a Heartbeat ACK payload (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Element::map())
    }

    /// Create a Reconnect payload (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Element::map())
    }

    /// Create an Invalid Session payload (op=9)
    ///
    /// `resumable` indicates if the session can be resumed.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Element::Bool(resumable))
    }

    // === Send-side payloads ===

    /// Create a Heartbeat payload (op=1) carrying the last seen sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, Element::from(last_sequence))
    }

    /// Create an Identify payload (op=2)
    #[must_use]
    pub fn identify(identify: &IdentifyPayload) -> Self {
        Self::new(OpCode::Identify, identify.to_element())
    }

    /// Create a Resume payload (op=6)
    #[must_use]
    pub fn resume(resume: &ResumePayload) -> Self {
        Self::new(OpCode::Resume, resume.to_element())
    }

    // === Accessors ===

    /// The `d` map, or an empty map when `d` is a scalar
    #[must_use]
    pub fn fields(&self) -> &ElementMap {
        self.data.fields()
    }

    /// Check if this is a dispatch for the given event
    #[must_use]
    pub fn is_event(&self, name: &str) -> bool {
        self.op == OpCode::Dispatch && self.event_name.as_deref() == Some(name)
    }

    // === Codec ===

    /// Build the envelope element
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut envelope = ElementMap::new();
        envelope.insert("op".to_string(), Element::from(self.op));
        envelope.insert("d".to_string(), self.data.clone());
        if let Some(s) = self.sequence {
            envelope.insert("s".to_string(), Element::from(s));
        }
        if let Some(t) = &self.event_name {
            envelope.insert("t".to_string(), Element::from(t.as_str()));
        }
        Element::Map(envelope)
    }

    /// Encode to a binary frame body
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    /// Decode a binary frame body
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_element(Element::decode(bytes)?)
    }

    /// Read the envelope out of a decoded element
    pub fn from_element(element: Element) -> Result<Self, ProtocolError> {
        let mut envelope = match element {
            Element::Map(envelope) => envelope,
            other => return Err(ProtocolError::NotAMap(other.kind())),
        };

        let raw_op = envelope
            .get("op")
            .ok_or(ProtocolError::MissingField("op"))?
            .to_int::<u8>()
            .map_err(|source| ProtocolError::InvalidField { field: "op", source })?;
        let op = OpCode::from_u8(raw_op).ok_or(ProtocolError::UnknownOpcode(raw_op))?;

        let sequence = match envelope.get("s") {
            None | Some(Element::Nil) => None,
            Some(s) => Some(
                s.to_int::<u64>()
                    .map_err(|source| ProtocolError::InvalidField { field: "s", source })?,
            ),
        };

        let event_name = match envelope.remove("t") {
            None | Some(Element::Nil) => None,
            Some(Element::String(t) | Element::Atom(t)) => Some(t),
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "t",
                    source: gateway_core::ConversionError::Unexpected {
                        expected: "string",
                        found: other.kind(),
                    },
                })
            }
        };

        let data = envelope.remove("d").unwrap_or_default();

        Ok(Self {
            op,
            sequence,
            event_name,
            data,
        })
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.event_name {
            write!(f, "Payload(op={}, t={}", self.op, t)?;
            if let Some(s) = self.sequence {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "Payload(op={})", self.op)
        }
    }
}
