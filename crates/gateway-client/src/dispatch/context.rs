//! Per-message handler context

use super::Identity;
use crate::connection::Outbound;
use crate::events::EventTable;
use crate::handlers::HandlerResult;
use crate::heartbeat::Heartbeat;
use crate::protocol::Payload;
use crate::ratelimit::RateLimits;
use gateway_common::{NoopTelemetry, Telemetry};
use gateway_core::SessionStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Services shared by every handler of a client
#[derive(Clone)]
pub struct Dependencies {
    pub session: Arc<dyn SessionStore>,
    /// Limiters for dials and outbound payloads
    pub limits: RateLimits,
    pub telemetry: Arc<dyn Telemetry>,
}

impl Dependencies {
    /// Dependencies with the default gateway limits and no telemetry
    #[must_use]
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self {
            session,
            limits: RateLimits::default(),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// What a handler sees while processing one payload
#[derive(Clone)]
pub struct EventContext {
    pub deps: Dependencies,
    pub identity: Arc<Identity>,
    pub heartbeat: Arc<Heartbeat>,
    pub events: Arc<EventTable>,
    pub outbound: Outbound,
    /// Scope of the message being handled; cancelled on shutdown
    pub scope: CancellationToken,
}

impl EventContext {
    /// Session store shortcut
    pub fn session(&self) -> &dyn SessionStore {
        self.deps.session.as_ref()
    }

    /// Enqueue a payload for the response loop
    pub async fn send(&self, payload: &Payload) -> HandlerResult<()> {
        self.outbound.send(&self.scope, payload).await?;
        Ok(())
    }
}
