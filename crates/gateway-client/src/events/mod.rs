//! Gateway events
//!
//! Dispatch event names, the handler registry, and the built-in handlers
//! that keep the session store current.

mod event_types;
mod session_events;
mod table;

pub use event_types::GatewayEventType;
pub use session_events::install_session_handlers;
pub use table::{EventHandler, EventTable};
