//! # gateway-client
//!
//! Client for a binary-framed real-time gateway: a bounded concurrent
//! WebSocket transport, opcode/event dispatch and the identify-or-resume
//! session lifecycle.

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod heartbeat;
pub mod protocol;
pub mod ratelimit;
pub mod session;

pub use client::{ClientError, GatewayClient};
pub use dispatch::{Dependencies, Dispatcher, EventContext, Identity};
pub use session::MemorySessionStore;

use events::GatewayEventType;
use gateway_common::{AppConfig, AppResult, Counters};
use handlers::HandlerResult;
use protocol::Payload;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the client until Ctrl-C or a fatal connection error
pub async fn run(config: AppConfig) -> AppResult<()> {
    // aws-lc-rs backs wss:// dials; a second install is a no-op
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing::info!(
        app = %config.app.name,
        env = ?config.app.env,
        url = %config.gateway.url,
        workers = config.gateway.workers,
        "Starting gateway client"
    );

    let counters = Arc::new(Counters::new());
    let store = MemorySessionStore::new_shared();
    let client = GatewayClient::new(&config, store.clone(), counters.clone())?;
    client.on(GatewayEventType::MessageCreate, log_message);

    let scope = CancellationToken::new();
    let signal = scope.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let result = client.run_forever(scope).await;

    tracing::info!(
        guilds = store.guild_count(),
        channels = store.channel_count(),
        members = store.member_count(),
        "Session cache at exit"
    );
    match serde_json::to_string(&counters.snapshot()) {
        Ok(snapshot) => tracing::info!(counters = %snapshot, "Gateway counters"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize counters"),
    }

    result.map_err(Into::into)
}

fn log_message(_ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
    let d = payload.fields();
    let author = d
        .get("author")
        .and_then(|author| author.get("username"))
        .and_then(gateway_core::Element::as_str)
        .unwrap_or("unknown");
    let channel_id = d.get("channel_id").map(ToString::to_string).unwrap_or_default();

    tracing::info!(seq = ?payload.sequence, channel_id = %channel_id, author, "Message created");
    Ok(())
}
