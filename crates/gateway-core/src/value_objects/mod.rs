//! Value objects - immutable types that represent protocol concepts

mod snowflake;

pub use snowflake::{Snowflake, SnowflakeParseError};
