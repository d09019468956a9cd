//! Built-in handlers feeding the session store
//!
//! READY establishes the session that later handshakes resume. Guild,
//! channel, member and role events keep the cached objects current.

use super::{EventTable, GatewayEventType};
use crate::dispatch::EventContext;
use crate::handlers::HandlerResult;
use crate::protocol::Payload;
use gateway_core::{require_id, Element, ElementMap, Snowflake, StoreError};

/// Register the session handlers on `table`
pub fn install_session_handlers(table: &EventTable) {
    table.on(GatewayEventType::Ready, on_ready);
    table.on(GatewayEventType::Resumed, on_resumed);
    table.on(GatewayEventType::GuildCreate, on_guild);
    table.on(GatewayEventType::GuildUpdate, on_guild);
    table.on(GatewayEventType::ChannelCreate, on_channel);
    table.on(GatewayEventType::ChannelUpdate, on_channel);
    table.on(GatewayEventType::GuildMemberAdd, on_member);
    table.on(GatewayEventType::GuildMemberUpdate, on_member);
    table.on(GatewayEventType::GuildRoleCreate, on_role);
    table.on(GatewayEventType::GuildRoleUpdate, on_role);
}

fn on_ready(ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    ctx.session().update_from_ready(payload.fields())?;
    tracing::info!(
        session_id = %ctx.session().session_id(),
        guilds = list(payload.fields(), "guilds").len(),
        "Session ready"
    );
    Ok(())
}

fn on_resumed(ctx: &EventContext, _payload: &Payload) -> HandlerResult<()> {
    tracing::info!(
        session_id = %ctx.session().session_id(),
        sequence = ctx.session().last_sequence(),
        "Session resumed"
    );
    Ok(())
}

fn on_guild(ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    let guild = payload.fields();
    let store = ctx.session();
    let guild_id = store.upsert_guild(guild)?;

    let mut applied = 0usize;
    for channel in maps(guild, "channels") {
        let mut channel = channel.clone();
        channel
            .entry("guild_id".to_string())
            .or_insert_with(|| Element::from(guild_id));
        applied += usize::from(log_nested("channel", store.upsert_channel(&channel)));
    }
    for member in maps(guild, "members") {
        applied += usize::from(log_nested("member", store.upsert_member(guild_id, member)));
    }
    for role in maps(guild, "roles") {
        applied += usize::from(log_nested("role", store.upsert_role(guild_id, role)));
    }

    tracing::debug!(guild_id = %guild_id, nested = applied, "Guild cached");
    Ok(())
}

fn on_channel(ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    let channel_id = ctx.session().upsert_channel(payload.fields())?;
    tracing::debug!(channel_id = %channel_id, "Channel cached");
    Ok(())
}

fn on_member(ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    let member = payload.fields();
    let guild_id = require_id("member", member, "guild_id")?;
    let user_id = ctx.session().upsert_member(guild_id, member)?;
    tracing::debug!(guild_id = %guild_id, user_id = %user_id, "Member cached");
    Ok(())
}

fn on_role(ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    let fields = payload.fields();
    let guild_id = require_id("role", fields, "guild_id")?;
    let role = fields
        .get("role")
        .ok_or(StoreError::MissingField {
            entity: "role",
            field: "role",
        })?
        .as_map()
        .ok_or(StoreError::NotAMap("role"))?;
    let role_id = ctx.session().upsert_role(guild_id, role)?;
    tracing::debug!(guild_id = %guild_id, role_id = %role_id, "Role cached");
    Ok(())
}

fn list<'a>(object: &'a ElementMap, field: &str) -> &'a [Element] {
    object.get(field).and_then(Element::as_list).unwrap_or_default()
}

fn maps<'a>(object: &'a ElementMap, field: &str) -> impl Iterator<Item = &'a ElementMap> {
    list(object, field).iter().filter_map(Element::as_map)
}

fn log_nested(entity: &'static str, result: Result<Snowflake, StoreError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(entity, error = %e, "Skipping nested object");
            false
        }
    }
}
