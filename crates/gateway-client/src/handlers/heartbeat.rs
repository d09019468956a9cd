//! Heartbeat handlers (op 1 and op 11)

use super::{HandlerResult, OpcodeHandler};
use crate::dispatch::EventContext;
use crate::protocol::Payload;
use async_trait::async_trait;

/// Answers a server heartbeat request with an immediate beat
#[derive(Debug, Default, Clone, Copy)]
pub struct HeartbeatHandler;

#[async_trait]
impl OpcodeHandler for HeartbeatHandler {
    async fn handle(&self, ctx: &EventContext, _payload: &Payload) -> HandlerResult<()> {
        tracing::trace!("Heartbeat requested by server");
        ctx.heartbeat.beat_now(&ctx.scope, &ctx.outbound).await?;
        Ok(())
    }
}

/// Records heartbeat acknowledgements
#[derive(Debug, Default, Clone, Copy)]
pub struct HeartbeatAckHandler;

#[async_trait]
impl OpcodeHandler for HeartbeatAckHandler {
    async fn handle(&self, ctx: &EventContext, _payload: &Payload) -> HandlerResult<()> {
        match ctx.heartbeat.ack() {
            Some(latency) => {
                tracing::trace!(latency_ms = latency.as_millis() as u64, "Heartbeat acknowledged");
            }
            None => tracing::debug!("Unsolicited heartbeat ACK"),
        }
        Ok(())
    }
}
