//! # gateway-core
//!
//! Domain layer containing the binary term codec, value objects, and the
//! session store port. This crate has no dependency on the network stack.

pub mod error;
pub mod etf;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::StoreError;
pub use etf::{ConversionError, DecodeError, Element, ElementMap};
pub use traits::{require_id, SessionStore, StoreResult};
pub use value_objects::{Snowflake, SnowflakeParseError};
