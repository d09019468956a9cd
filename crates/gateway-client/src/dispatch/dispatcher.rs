//! Payload dispatcher
//!
//! Decodes each inbound frame, tracks the sequence number and routes the
//! payload to its opcode handler. The opcode table is fixed once built; only
//! the event table accepts new handlers afterwards.

use super::{Dependencies, EventContext, Identity};
use crate::connection::{Message, MessageHandler, Outbound};
use crate::events::{EventHandler, EventTable};
use crate::handlers::{
    DispatchHandler, HandlerError, HandlerResult, HeartbeatAckHandler, HeartbeatHandler,
    HelloHandler, OpcodeHandler,
};
use crate::heartbeat::Heartbeat;
use crate::protocol::{OpCode, Payload, ProtocolError};
use async_trait::async_trait;
use gateway_core::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Routes decoded payloads to opcode and event handlers
pub struct Dispatcher {
    opcodes: HashMap<OpCode, Arc<dyn OpcodeHandler>>,
    events: Arc<EventTable>,
    deps: Dependencies,
    identity: Arc<Identity>,
    heartbeat: Arc<Heartbeat>,
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    opcodes: HashMap<OpCode, Arc<dyn OpcodeHandler>>,
    events: Arc<EventTable>,
    deps: Dependencies,
    identity: Identity,
}

impl DispatcherBuilder {
    /// Start with the default Hello, Heartbeat, HeartbeatAck and Dispatch handlers
    #[must_use]
    pub fn new(deps: Dependencies, identity: Identity) -> Self {
        let mut opcodes: HashMap<OpCode, Arc<dyn OpcodeHandler>> = HashMap::new();
        opcodes.insert(OpCode::Dispatch, Arc::new(DispatchHandler));
        opcodes.insert(OpCode::Heartbeat, Arc::new(HeartbeatHandler));
        opcodes.insert(OpCode::HeartbeatAck, Arc::new(HeartbeatAckHandler));
        opcodes.insert(OpCode::Hello, Arc::new(HelloHandler));

        Self {
            opcodes,
            events: Arc::new(EventTable::new()),
            deps,
            identity,
        }
    }

    /// Install or replace the handler for `op`
    #[must_use]
    pub fn with_opcode_handler(mut self, op: OpCode, handler: impl OpcodeHandler + 'static) -> Self {
        self.opcodes.insert(op, Arc::new(handler));
        self
    }

    /// Share an existing event table
    #[must_use]
    pub fn with_event_table(mut self, events: Arc<EventTable>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        let heartbeat = Arc::new(Heartbeat::new(Arc::clone(&self.deps.session)));
        Dispatcher {
            opcodes: self.opcodes,
            events: self.events,
            deps: self.deps,
            identity: Arc::new(self.identity),
            heartbeat,
        }
    }
}

impl Dispatcher {
    #[must_use]
    pub fn builder(deps: Dependencies, identity: Identity) -> DispatcherBuilder {
        DispatcherBuilder::new(deps, identity)
    }

    /// Event table shared with every handler context
    pub fn events(&self) -> &Arc<EventTable> {
        &self.events
    }

    /// Register a handler for a dispatch event
    pub fn add_event_handler(&self, event: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.events.add(event, handler);
    }

    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.deps.session
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    /// Whether an opcode has a handler installed
    pub fn handles(&self, op: OpCode) -> bool {
        self.opcodes.contains_key(&op)
    }

    /// Route a decoded payload
    pub async fn dispatch(
        &self,
        payload: Payload,
        outbound: Outbound,
        scope: CancellationToken,
    ) -> HandlerResult<()> {
        if scope.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }

        if let Some(seq) = payload.sequence {
            self.deps.session.update_sequence(seq);
        }
        if let Err(e) = self.deps.telemetry.record_opcode(payload.op.name()) {
            tracing::debug!(error = %e, "Opcode not counted");
        }

        let Some(handler) = self.opcodes.get(&payload.op) else {
            tracing::info!(op = %payload.op, "No handler installed for opcode");
            return Ok(());
        };

        let ctx = EventContext {
            deps: self.deps.clone(),
            identity: Arc::clone(&self.identity),
            heartbeat: Arc::clone(&self.heartbeat),
            events: Arc::clone(&self.events),
            outbound,
            scope,
        };
        handler.handle(&ctx, &payload).await
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: Message, outbound: Outbound) -> HandlerResult<()> {
        if message.scope.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }

        let payload = match Payload::decode(&message.bytes) {
            Ok(payload) => payload,
            Err(ProtocolError::UnknownOpcode(op)) => {
                tracing::warn!(op, "Dropping payload with unknown opcode");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    kind = message.kind.as_str(),
                    len = message.len(),
                    truncated = e.is_truncated(),
                    error = %e,
                    "Dropping undecodable frame"
                );
                return Ok(());
            }
        };

        tracing::trace!(op = %payload.op, seq = ?payload.sequence, event = ?payload.event_name, "Dispatching");
        self.dispatch(payload, outbound, message.scope).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut opcodes: Vec<OpCode> = self.opcodes.keys().copied().collect();
        opcodes.sort_by_key(|op| op.as_u8());
        f.debug_struct("Dispatcher")
            .field("opcodes", &opcodes)
            .field("events", &self.events)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
