//! Token bucket limiters
//!
//! Thin wrapper over `governor` with a cancellable blocking acquire.

use gateway_common::RateLimitConfig;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Rate limit errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// The waiting scope was cancelled before a token became available
    #[error("Rate limit wait cancelled")]
    Cancelled,

    /// The limiter could not be built from the given settings
    #[error("Invalid rate limit: {burst} per {period:?}")]
    InvalidQuota { period: Duration, burst: u32 },
}

/// Default outbound payload rate: one token every 500 ms, bursting to 120
const MESSAGES_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(120) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default dial rate: one every 5 s, no burst
const DIALS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(12) {
    Some(n) => n,
    None => unreachable!(),
};

/// A named token bucket
pub struct RateLimiter {
    name: &'static str,
    inner: DefaultDirectRateLimiter,
}

impl RateLimiter {
    /// Create a limiter that refills one token per `period` and holds at most `burst`
    pub fn new(name: &'static str, period: Duration, burst: u32) -> Result<Self, RateLimitError> {
        let invalid = || RateLimitError::InvalidQuota { period, burst };
        let burst = NonZeroU32::new(burst).ok_or_else(invalid)?;
        let quota = Quota::with_period(period).ok_or_else(invalid)?.allow_burst(burst);
        Ok(Self::from_quota(name, quota))
    }

    fn from_quota(name: &'static str, quota: Quota) -> Self {
        Self {
            name,
            inner: governor::RateLimiter::direct(quota),
        }
    }

    /// Get the limiter name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Take a token without waiting
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    /// Wait until a token is available or `scope` is cancelled
    pub async fn wait(&self, scope: &CancellationToken) -> Result<(), RateLimitError> {
        if scope.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }
        if self.try_acquire() {
            return Ok(());
        }

        tracing::debug!(limiter = self.name, "Rate limited, waiting for a token");
        tokio::select! {
            biased;
            () = scope.cancelled() => Err(RateLimitError::Cancelled),
            () = self.inner.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("name", &self.name).finish()
    }
}

/// The two gateway limiters, shared by every sender
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Gates every outbound gateway payload
    pub message: Arc<RateLimiter>,
    /// Gates every dial
    pub connect: Arc<RateLimiter>,
}

impl RateLimits {
    /// Build both limiters from configuration
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        Ok(Self {
            message: Arc::new(RateLimiter::new(
                "message",
                config.message_period(),
                config.message_burst,
            )?),
            connect: Arc::new(RateLimiter::new(
                "connect",
                config.connect_period(),
                config.connect_burst,
            )?),
        })
    }

    /// Limits that never throttle in practice, for tests and local tooling
    #[must_use]
    pub fn unlimited() -> Self {
        let quota = Quota::with_period(Duration::from_nanos(1))
            .map(|q| q.allow_burst(NonZeroU32::MAX));
        let limiter = |name| {
            Arc::new(RateLimiter::from_quota(
                name,
                quota.unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX)),
            ))
        };
        Self {
            message: limiter("message"),
            connect: limiter("connect"),
        }
    }
}

impl Default for RateLimits {
    /// The gateway's published limits, matching `RateLimitConfig::default()`
    fn default() -> Self {
        Self {
            message: Arc::new(RateLimiter::from_quota(
                "message",
                Quota::per_minute(MESSAGES_PER_MINUTE),
            )),
            connect: Arc::new(RateLimiter::from_quota(
                "connect",
                Quota::per_minute(DIALS_PER_MINUTE).allow_burst(NonZeroU32::MIN),
            )),
        }
    }
}
