//! Dispatch handler (op 0)
//!
//! Routes an event to every handler registered for its name.

use super::{HandlerResult, OpcodeHandler};
use crate::dispatch::EventContext;
use crate::protocol::Payload;
use async_trait::async_trait;

/// Fans a dispatch out to the event table
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchHandler;

#[async_trait]
impl OpcodeHandler for DispatchHandler {
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
        let Some(event) = payload.event_name.as_deref() else {
            tracing::warn!(seq = ?payload.sequence, "Dispatch without an event name");
            return Ok(());
        };

        if let Err(e) = ctx.deps.telemetry.record_event(event) {
            tracing::debug!(error = %e, "Event not counted");
        }

        let handlers = ctx.events.handlers_for(event);
        if handlers.is_empty() {
            tracing::debug!(event, seq = ?payload.sequence, "No handlers for event");
            return Ok(());
        }

        // every handler runs; the first failure is reported after the rest
        let mut first_error = None;
        for handler in handlers {
            if let Err(e) = handler.handle(ctx, payload).await {
                tracing::warn!(event, error = %e, "Event handler failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
