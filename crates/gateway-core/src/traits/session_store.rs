//! Session store port
//!
//! The dispatch layer never holds guild/channel/member/role state itself; it
//! applies gateway objects through this trait and reads back only what the
//! handshake needs (session id and last sequence).

use crate::error::StoreError;
use crate::etf::ElementMap;
use crate::value_objects::Snowflake;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Session state and domain object cache fed by gateway events
pub trait SessionStore: Send + Sync {
    /// Current session id, empty when no session has been established
    fn session_id(&self) -> String;

    /// Sequence number of the last dispatch seen
    fn last_sequence(&self) -> u64;

    /// Record the sequence number of a received payload
    fn update_sequence(&self, sequence: u64);

    /// Forget the session so the next handshake identifies instead of resuming
    fn clear_session(&self);

    /// Apply the data of a `READY` dispatch
    fn update_from_ready(&self, ready: &ElementMap) -> StoreResult<()>;

    /// Insert or replace a guild, returning its id
    fn upsert_guild(&self, guild: &ElementMap) -> StoreResult<Snowflake>;

    /// Insert or replace a channel, returning its id
    fn upsert_channel(&self, channel: &ElementMap) -> StoreResult<Snowflake>;

    /// Insert or replace a guild member, returning the member's user id
    fn upsert_member(&self, guild_id: Snowflake, member: &ElementMap) -> StoreResult<Snowflake>;

    /// Insert or replace a guild role, returning its id
    fn upsert_role(&self, guild_id: Snowflake, role: &ElementMap) -> StoreResult<Snowflake>;
}

/// Read a required snowflake field from a gateway object
pub fn require_id(
    entity: &'static str,
    object: &ElementMap,
    field: &'static str,
) -> StoreResult<Snowflake> {
    let element = object
        .get(field)
        .ok_or(StoreError::MissingField { entity, field })?;
    Snowflake::try_from(element).map_err(|source| StoreError::InvalidField {
        entity,
        field,
        source,
    })
}
