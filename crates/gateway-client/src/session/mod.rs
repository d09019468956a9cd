//! Session state

mod store;

pub use store::MemorySessionStore;
