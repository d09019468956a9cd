//! Integration test utilities for the gateway client
//!
//! This crate provides a scripted in-process gateway server and payload
//! fixtures for end-to-end tests of the client.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
