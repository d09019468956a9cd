//! Control payload definitions
//!
//! Typed views of the `d` field for the handshake opcodes.

use gateway_core::{ConversionError, Element, ElementMap};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }

    /// Read the payload from a Hello `d` map
    pub fn from_fields(fields: &ElementMap) -> Result<Self, ConversionError> {
        let interval = fields
            .get("heartbeat_interval")
            .ok_or(ConversionError::Unexpected {
                expected: "heartbeat_interval",
                found: "nothing",
            })?
            .to_int::<u64>()?;
        if interval == 0 {
            return Err(ConversionError::Overflow {
                value: 0,
                target: "non-zero heartbeat interval",
            });
        }
        Ok(Self::with_interval(interval))
    }

    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut d = ElementMap::new();
        d.insert(
            "heartbeat_interval".to_string(),
            Element::from(self.heartbeat_interval),
        );
        Element::Map(d)
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,
    /// Library or client name
    pub browser: String,
    /// Device name
    pub device: String,
}

impl IdentifyProperties {
    #[must_use]
    pub fn new(os: impl Into<String>, browser: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            browser: browser.into(),
            device: device.into(),
        }
    }

    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut props = ElementMap::new();
        props.insert("os".to_string(), Element::from(self.os.as_str()));
        props.insert("browser".to_string(), Element::from(self.browser.as_str()));
        props.insert("device".to_string(), Element::from(self.device.as_str()));
        Element::Map(props)
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new(std::env::consts::OS, env!("CARGO_PKG_NAME"), env!("CARGO_PKG_NAME"))
    }
}

/// A single presence activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub name: String,
    /// Activity type; 0 is "Playing"
    pub kind: u8,
}

impl Activity {
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: 0,
        }
    }

    fn to_element(&self) -> Element {
        let mut activity = ElementMap::new();
        activity.insert("name".to_string(), Element::from(self.name.as_str()));
        activity.insert("type".to_string(), Element::from(self.kind));
        Element::Map(activity)
    }
}

/// Payload for op 3 (Status Update), also embedded in Identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdatePayload {
    /// New status (online, idle, dnd, invisible, offline)
    pub status: String,
    /// Unix time in milliseconds the client went idle
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub afk: bool,
}

impl PresenceUpdatePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "idle", "dnd", "invisible", "offline"];

    #[must_use]
    pub fn online() -> Self {
        Self {
            status: "online".to_string(),
            since: None,
            activities: Vec::new(),
            afk: false,
        }
    }

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }

    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut presence = ElementMap::new();
        presence.insert("status".to_string(), Element::from(self.status.as_str()));
        presence.insert("since".to_string(), Element::from(self.since));
        presence.insert(
            "activities".to_string(),
            Element::List(self.activities.iter().map(Activity::to_element).collect()),
        );
        presence.insert("afk".to_string(), Element::Bool(self.afk));
        Element::Map(presence)
    }
}

impl Default for PresenceUpdatePayload {
    fn default() -> Self {
        Self::online()
    }
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to start a new session.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,
    pub properties: IdentifyProperties,
    pub compress: bool,
    /// Member count above which offline members are not sent
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`
    pub shard: [u32; 2],
    pub presence: PresenceUpdatePayload,
    pub intents: u64,
}

impl IdentifyPayload {
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut d = ElementMap::new();
        d.insert("token".to_string(), Element::from(self.token.as_str()));
        d.insert("properties".to_string(), self.properties.to_element());
        d.insert("compress".to_string(), Element::Bool(self.compress));
        d.insert(
            "large_threshold".to_string(),
            Element::from(self.large_threshold),
        );
        d.insert(
            "shard".to_string(),
            Element::List(self.shard.iter().copied().map(Element::from).collect()),
        );
        d.insert("presence".to_string(), self.presence.to_element());
        d.insert("intents".to_string(), Element::from(self.intents));
        Element::Map(d)
    }
}

impl std::fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to resume a disconnected session.
#[derive(Clone, PartialEq, Eq)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,
    /// Session ID to resume
    pub session_id: String,
    /// Last received sequence number
    pub seq: u64,
}

impl ResumePayload {
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut d = ElementMap::new();
        d.insert("token".to_string(), Element::from(self.token.as_str()));
        d.insert(
            "session_id".to_string(),
            Element::from(self.session_id.as_str()),
        );
        d.insert("seq".to_string(), Element::from(self.seq));
        Element::Map(d)
    }
}

impl std::fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identify() -> IdentifyPayload {
        IdentifyPayload {
            token: "Bot token123".to_string(),
            properties: IdentifyProperties::new("linux", "gateway-client", "gateway-client"),
            compress: false,
            large_threshold: 250,
            shard: [0, 1],
            presence: PresenceUpdatePayload {
                activities: vec![Activity::playing("chess")],
                ..PresenceUpdatePayload::online()
            },
            intents: 513,
        }
    }

    #[test]
    fn test_hello_from_fields() {
        let d = HelloPayload::with_interval(41_250).to_element();
        assert_eq!(
            HelloPayload::from_fields(d.fields()),
            Ok(HelloPayload::with_interval(41_250))
        );
    }

    #[test]
    fn test_hello_rejects_bad_interval() {
        let mut d = ElementMap::new();
        assert!(HelloPayload::from_fields(&d).is_err());

        d.insert("heartbeat_interval".to_string(), Element::from("soon"));
        assert!(matches!(
            HelloPayload::from_fields(&d),
            Err(ConversionError::NotAnInteger(_))
        ));

        d.insert("heartbeat_interval".to_string(), Element::Int(-5));
        assert!(matches!(
            HelloPayload::from_fields(&d),
            Err(ConversionError::Overflow { .. })
        ));

        d.insert("heartbeat_interval".to_string(), Element::SmallInt(0));
        assert!(HelloPayload::from_fields(&d).is_err());
    }

    #[test]
    fn test_identify_element() {
        let d = identify().to_element();

        assert_eq!(d.get("token").and_then(Element::as_str), Some("Bot token123"));
        assert_eq!(d.get("compress").and_then(Element::as_bool), Some(false));
        assert_eq!(
            d.get("large_threshold").map(|e| e.to_int::<u32>()),
            Some(Ok(250))
        );
        assert_eq!(d.get("intents").map(|e| e.to_int::<u64>()), Some(Ok(513)));

        let shard = d.get("shard").and_then(Element::as_list).unwrap();
        assert_eq!(shard, &[Element::SmallInt(0), Element::SmallInt(1)]);

        let props = d.get("properties").unwrap();
        assert_eq!(props.get("os").and_then(Element::as_str), Some("linux"));

        let presence = d.get("presence").unwrap();
        assert_eq!(presence.get("status").and_then(Element::as_str), Some("online"));
        assert_eq!(presence.get("since"), Some(&Element::Nil));
        assert_eq!(presence.get("afk"), Some(&Element::Bool(false)));
        let activities = presence.get("activities").and_then(Element::as_list).unwrap();
        assert_eq!(activities[0].get("name").and_then(Element::as_str), Some("chess"));
    }

    #[test]
    fn test_resume_element() {
        let resume = ResumePayload {
            token: "Bot token123".to_string(),
            session_id: "abc123".to_string(),
            seq: 42,
        };
        let d = resume.to_element();

        assert_eq!(d.get("session_id").and_then(Element::as_str), Some("abc123"));
        assert_eq!(d.get("seq").map(|e| e.to_int::<u64>()), Some(Ok(42)));
    }

    #[test]
    fn test_token_is_redacted() {
        let debug = format!("{:?}", identify());
        assert!(!debug.contains("token123"));
    }

    #[test]
    fn test_presence_update_validation() {
        assert!(PresenceUpdatePayload::online().is_valid_status());

        let invalid = PresenceUpdatePayload {
            status: "busy".to_string(),
            ..PresenceUpdatePayload::online()
        };
        assert!(!invalid.is_valid_status());
    }
}
