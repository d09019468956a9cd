//! Binary term codec
//!
//! A subset of the external term format used by the gateway's binary frame
//! mode: integers of three widths, floats, atoms (booleans and nil),
//! UTF-8 binaries, proper lists and string-keyed maps. Every encoded term
//! starts with the version byte `131`.

mod decode;
mod element;
mod encode;
mod error;
pub mod tags;

pub use decode::{decode, MAX_DEPTH};
pub use element::{Element, ElementMap};
pub use encode::encode;
pub use error::{ConversionError, DecodeError};
