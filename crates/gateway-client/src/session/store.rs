//! In-memory session store
//!
//! Holds the resumable session and a cache of the guild objects the gateway
//! has sent. Objects are stored as received, minus nested lists that get
//! their own maps.

use dashmap::DashMap;
use gateway_core::{
    require_id, Element, ElementMap, SessionStore, Snowflake, StoreError, StoreResult,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Guild fields cached in their own maps instead of on the guild
const NESTED_GUILD_FIELDS: [&str; 3] = ["channels", "members", "roles"];

/// Session state and object cache backed by concurrent maps
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session_id: RwLock<String>,
    resume_url: RwLock<Option<String>>,
    user: RwLock<Option<ElementMap>>,
    sequence: AtomicU64,

    guilds: DashMap<Snowflake, ElementMap>,
    channels: DashMap<Snowflake, ElementMap>,
    /// Keyed by `(guild_id, user_id)`
    members: DashMap<(Snowflake, Snowflake), ElementMap>,
    /// Keyed by `(guild_id, role_id)`
    roles: DashMap<(Snowflake, Snowflake), ElementMap>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// URL the server asked resumes to dial, if it sent one
    pub fn resume_url(&self) -> Option<String> {
        self.resume_url.read().clone()
    }

    /// The user the session belongs to
    pub fn current_user(&self) -> Option<ElementMap> {
        self.user.read().clone()
    }

    pub fn guild(&self, id: Snowflake) -> Option<ElementMap> {
        self.guilds.get(&id).map(|entry| entry.value().clone())
    }

    pub fn channel(&self, id: Snowflake) -> Option<ElementMap> {
        self.channels.get(&id).map(|entry| entry.value().clone())
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<ElementMap> {
        self.members
            .get(&(guild_id, user_id))
            .map(|entry| entry.value().clone())
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<ElementMap> {
        self.roles
            .get(&(guild_id, role_id))
            .map(|entry| entry.value().clone())
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

impl SessionStore for MemorySessionStore {
    fn session_id(&self) -> String {
        self.session_id.read().clone()
    }

    fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    fn update_sequence(&self, sequence: u64) {
        self.sequence.store(sequence, Ordering::Release);
    }

    fn clear_session(&self) {
        self.session_id.write().clear();
        *self.resume_url.write() = None;
        self.sequence.store(0, Ordering::Release);
        tracing::debug!("Session cleared");
    }

    fn update_from_ready(&self, ready: &ElementMap) -> StoreResult<()> {
        let session_id = ready
            .get("session_id")
            .and_then(Element::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(StoreError::MissingField {
                entity: "ready",
                field: "session_id",
            })?;

        let user = match ready.get("user") {
            Some(Element::Map(user)) => Some(user.clone()),
            Some(_) => return Err(StoreError::NotAMap("ready.user")),
            None => None,
        };

        *self.session_id.write() = session_id.to_string();
        *self.resume_url.write() = ready
            .get("resume_gateway_url")
            .and_then(Element::as_str)
            .map(str::to_string);
        *self.user.write() = user;

        // unavailable guilds arrive as stubs; full objects follow in GUILD_CREATE
        let stubs = ready
            .get("guilds")
            .and_then(Element::as_list)
            .unwrap_or_default();
        for guild in stubs.iter().filter_map(Element::as_map) {
            match require_id("guild", guild, "id") {
                Ok(id) => {
                    self.guilds.entry(id).or_insert_with(|| guild.clone());
                }
                Err(e) => tracing::warn!(error = %e, "Skipping guild stub"),
            }
        }

        Ok(())
    }

    fn upsert_guild(&self, guild: &ElementMap) -> StoreResult<Snowflake> {
        let id = require_id("guild", guild, "id")?;
        let stored: ElementMap = guild
            .iter()
            .filter(|(key, _)| !NESTED_GUILD_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.guilds.insert(id, stored);
        Ok(id)
    }

    fn upsert_channel(&self, channel: &ElementMap) -> StoreResult<Snowflake> {
        let id = require_id("channel", channel, "id")?;
        self.channels.insert(id, channel.clone());
        Ok(id)
    }

    fn upsert_member(&self, guild_id: Snowflake, member: &ElementMap) -> StoreResult<Snowflake> {
        let user = member
            .get("user")
            .ok_or(StoreError::MissingField {
                entity: "member",
                field: "user",
            })?
            .as_map()
            .ok_or(StoreError::NotAMap("member.user"))?;
        let user_id = require_id("user", user, "id")?;
        self.members.insert((guild_id, user_id), member.clone());
        Ok(user_id)
    }

    fn upsert_role(&self, guild_id: Snowflake, role: &ElementMap) -> StoreResult<Snowflake> {
        let id = require_id("role", role, "id")?;
        self.roles.insert((guild_id, id), role.clone());
        Ok(id)
    }
}
