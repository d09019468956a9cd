//! Handshake identity
//!
//! Everything the client needs to build Identify and Resume payloads.

use crate::protocol::{
    Activity, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload, ResumePayload,
};
use gateway_common::AppConfig;

/// Default member count above which offline members are omitted
pub const DEFAULT_LARGE_THRESHOLD: u32 = 250;

/// Credentials and settings sent during the handshake
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub token: String,
    pub properties: IdentifyProperties,
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`
    pub shard: [u32; 2],
    pub intents: u64,
    pub presence: PresenceUpdatePayload,
}

impl Identity {
    /// Identity with default properties for a single unsharded connection
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            shard: [0, 1],
            intents: 0,
            presence: PresenceUpdatePayload::online(),
        }
    }

    /// Build from application configuration
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let identify = &config.identify;
        let mut presence = PresenceUpdatePayload::online();
        presence.status.clone_from(&identify.status);
        presence.activities = identify
            .activity
            .iter()
            .map(|name| Activity::playing(name.as_str()))
            .collect();

        Self {
            token: config.gateway.token.clone(),
            properties: IdentifyProperties::new(
                identify.os.as_str(),
                identify.browser.as_str(),
                identify.device.as_str(),
            ),
            large_threshold: identify.large_threshold,
            shard: [identify.shard_id, identify.shard_count],
            intents: identify.intents,
            presence,
        }
    }

    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    /// Payload for a fresh session
    #[must_use]
    pub fn identify(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            properties: self.properties.clone(),
            compress: false,
            large_threshold: self.large_threshold,
            shard: self.shard,
            presence: self.presence.clone(),
            intents: self.intents,
        }
    }

    /// Payload resuming `session_id` after `seq`
    #[must_use]
    pub fn resume(&self, session_id: impl Into<String>, seq: u64) -> ResumePayload {
        ResumePayload {
            token: self.token.clone(),
            session_id: session_id.into(),
            seq,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .field("presence", &self.presence)
            .finish()
    }
}
