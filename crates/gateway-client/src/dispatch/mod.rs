//! Opcode and event dispatch
//!
//! The [`Dispatcher`] is the transport's message handler. It owns the fixed
//! opcode table, the shared event table and the heartbeat, and decides
//! between Identify and Resume on every Hello.

mod context;
mod dispatcher;
mod identity;

pub use context::{Dependencies, EventContext};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use identity::{Identity, DEFAULT_LARGE_THRESHOLD};
