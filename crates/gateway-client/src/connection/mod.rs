//! Connection transport
//!
//! Socket ownership, the read and response loops, the bounded worker pool
//! and the outbound queue.

mod error;
mod handler;
mod message;
mod outbound;
mod pool;
mod state;
mod transport;

pub use error::TransportError;
pub use handler::MessageHandler;
pub use message::{FrameKind, Message};
pub use outbound::{Outbound, OutboundQueue, SendError};
pub use pool::{WorkerPool, DEFAULT_WORKERS};
pub use state::{ConnectionState, StateCell};
pub use transport::{GatewayStream, Transport, TransportConfig, DEFAULT_SHUTDOWN_GRACE};
