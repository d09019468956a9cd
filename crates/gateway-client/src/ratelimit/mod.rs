//! Outbound rate limiting
//!
//! Token buckets gating gateway sends and dials.

mod limiter;

pub use limiter::{RateLimitError, RateLimiter, RateLimits};
