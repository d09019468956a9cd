//! Event handler registry
//!
//! Handlers are keyed by the dispatch event name and run in registration
//! order. Registration may happen while the connection is running.

use crate::dispatch::EventContext;
use crate::handlers::HandlerResult;
use crate::protocol::Payload;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler for one dispatch event name
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()>;
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(&EventContext, &Payload) -> HandlerResult<()> + Send + Sync,
{
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()> {
        self(ctx, payload)
    }
}

/// Event name to handler list
#[derive(Default)]
pub struct EventTable {
    handlers: Mutex<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event`
    pub fn add(&self, event: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event = event.into();
        tracing::debug!(event = %event, "Registering event handler");
        self.handlers.lock().entry(event).or_default().push(handler);
    }

    /// Append a plain function or closure for `event`
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&EventContext, &Payload) -> HandlerResult<()> + Send + Sync + 'static,
    {
        self.add(event, Arc::new(handler));
    }

    /// Snapshot of the handlers for `event`, in registration order
    pub fn handlers_for(&self, event: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers.lock().get(event).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `event`
    pub fn count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }

    /// Event names with at least one handler
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for EventTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTable")
            .field("events", &self.events())
            .finish()
    }
}
