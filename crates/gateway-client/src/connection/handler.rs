//! Message handler seam between the transport and dispatch

use super::{Message, Outbound};
use crate::handlers::HandlerResult;
use async_trait::async_trait;

/// Consumer of inbound frames
///
/// Called once per frame on a pool task. `outbound` enqueues replies for the
/// response loop.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message, outbound: Outbound) -> HandlerResult<()>;
}
