//! Gateway protocol definitions
//!
//! Op codes, the payload envelope, control payloads and close codes.

mod close_codes;
mod error;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use error::ProtocolError;
pub use messages::Payload;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    ResumePayload,
};
