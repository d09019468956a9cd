//! Op code handlers
//!
//! Each handler processes one opcode for the [`Dispatcher`](crate::dispatch::Dispatcher).

mod dispatch;
mod error;
mod heartbeat;
mod hello;
mod session;

pub use dispatch::DispatchHandler;
pub use error::{HandlerError, HandlerResult};
pub use heartbeat::{HeartbeatAckHandler, HeartbeatHandler};
pub use hello::HelloHandler;
pub use session::{ConnectionSlot, InvalidSessionHandler, ReconnectHandler};

use crate::dispatch::EventContext;
use crate::protocol::Payload;
use async_trait::async_trait;

/// Handler for one opcode
#[async_trait]
pub trait OpcodeHandler: Send + Sync {
    async fn handle(&self, ctx: &EventContext, payload: &Payload) -> HandlerResult<()>;
}
