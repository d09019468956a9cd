//! Hello handler (op 10)
//!
//! Configures the heartbeat and answers with Identify or Resume.

use super::{HandlerError, HandlerResult, OpcodeHandler};
use crate::dispatch::EventContext;
use crate::protocol::{HelloPayload, Payload};
use async_trait::async_trait;

/// Handles the server greeting
#[derive(Debug, Default, Clone, Copy)]
pub struct HelloHandler;

#[async_trait]
impl OpcodeHandler for HelloHandler {
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
        match HelloPayload::from_fields(payload.fields()) {
            Ok(hello) => {
                ctx.heartbeat
                    .reconfigure(&ctx.scope, hello.heartbeat_interval, ctx.outbound.clone());
            }
            Err(e) => {
                let err = HandlerError::Configuration(format!("heartbeat_interval: {e}"));
                tracing::warn!(error = %err, "Heartbeat disabled for this connection");
            }
        }

        handshake(ctx).await
    }
}

/// Send Resume when a session exists, Identify otherwise
pub(crate) async fn handshake(ctx: &EventContext) -> HandlerResult<()> {
    let session_id = ctx.session().session_id();

    let payload = if session_id.is_empty() {
        tracing::info!(shard = ?ctx.identity.shard, intents = ctx.identity.intents, "Identifying");
        Payload::identify(&ctx.identity.identify())
    } else {
        let seq = ctx.session().last_sequence();
        tracing::info!(session_id = %session_id, seq, "Resuming session");
        Payload::resume(&ctx.identity.resume(session_id, seq))
    };

    ctx.send(&payload).await
}
