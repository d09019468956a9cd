//! Session control handlers (op 7 and op 9)
//!
//! Installed by the client; a bare dispatcher only logs these opcodes.

use super::{hello::handshake, HandlerError, HandlerResult, OpcodeHandler};
use crate::dispatch::EventContext;
use crate::protocol::Payload;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared slot holding the scope of the live connection
pub type ConnectionSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Closes the live connection so the client can dial again and resume
#[derive(Debug, Clone, Default)]
pub struct ReconnectHandler {
    connection: ConnectionSlot,
}

impl ReconnectHandler {
    #[must_use]
    pub fn new(connection: ConnectionSlot) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl OpcodeHandler for ReconnectHandler {
    async fn handle(&self, _ctx: &EventContext, _payload: &Payload) -> HandlerResult<()> {
        let live = self.connection.lock().clone();
        match live {
            Some(scope) => {
                tracing::info!("Server requested reconnect");
                scope.cancel();
            }
            None => tracing::warn!("Reconnect requested with no live connection"),
        }
        Ok(())
    }
}

/// Re-runs the handshake after the server rejects the session
///
/// A non-resumable rejection clears the session first so the retry identifies.
#[derive(Debug, Clone)]
pub struct InvalidSessionHandler {
    min_delay: Duration,
    max_delay: Duration,
}

impl InvalidSessionHandler {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    fn delay(&self) -> Duration {
        if self.max_delay == self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

impl Default for InvalidSessionHandler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(5))
    }
}

#[async_trait]
impl OpcodeHandler for InvalidSessionHandler {
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
        let resumable = payload.data.as_bool().unwrap_or(false);
        if !resumable {
            ctx.session().clear_session();
        }

        let delay = self.delay();
        tracing::warn!(
            resumable,
            retry_in_ms = delay.as_millis() as u64,
            "Session invalidated"
        );

        tokio::select! {
            biased;
            () = ctx.scope.cancelled() => return Err(HandlerError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }

        handshake(ctx).await
    }
}
