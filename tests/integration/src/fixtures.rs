//! Test fixtures for integration tests
//!
//! Builders for the dispatch payloads a gateway sends.

use gateway_core::{Element, ElementMap};

/// Build a map element from key/value pairs
pub fn object(pairs: &[(&str, Element)]) -> Element {
    Element::Map(
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect::<ElementMap>(),
    )
}

/// A user object
pub fn user(id: u64, username: &str) -> Element {
    object(&[
        ("id", Element::from(id.to_string())),
        ("username", Element::from(username)),
    ])
}

/// `READY` data announcing `guild_ids` as unavailable stubs
pub fn ready(session_id: &str, user_id: u64, guild_ids: &[u64]) -> Element {
    let guilds = guild_ids
        .iter()
        .map(|id| {
            object(&[
                ("id", Element::from(*id)),
                ("unavailable", Element::Bool(true)),
            ])
        })
        .collect::<Vec<_>>();

    object(&[
        ("v", Element::from(10u8)),
        ("session_id", Element::from(session_id)),
        ("resume_gateway_url", Element::from("ws://127.0.0.1:1")),
        ("user", user(user_id, "gateway-bot")),
        ("guilds", Element::List(guilds)),
    ])
}

/// `GUILD_CREATE` data with one text channel, one member and one role
pub fn guild_create(guild_id: u64, channel_id: u64, member_id: u64, role_id: u64) -> Element {
    object(&[
        ("id", Element::from(guild_id)),
        ("name", Element::from("integration guild")),
        ("member_count", Element::from(1u8)),
        (
            "channels",
            Element::List(vec![object(&[
                ("id", Element::from(channel_id)),
                ("type", Element::from(0u8)),
                ("name", Element::from("general")),
            ])]),
        ),
        (
            "members",
            Element::List(vec![object(&[
                ("user", user(member_id, "member")),
                ("roles", Element::List(vec![Element::from(role_id)])),
            ])]),
        ),
        (
            "roles",
            Element::List(vec![object(&[
                ("id", Element::from(role_id)),
                ("name", Element::from("moderators")),
            ])]),
        ),
    ])
}

/// `MESSAGE_CREATE` data
pub fn message_create(channel_id: u64, content: &str) -> Element {
    object(&[
        ("id", Element::from(1u64)),
        ("channel_id", Element::from(channel_id)),
        ("content", Element::from(content)),
        ("author", user(7, "someone")),
    ])
}
