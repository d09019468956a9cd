//! Ports implemented outside the domain layer

mod session_store;

pub use session_store::{require_id, SessionStore, StoreResult};
