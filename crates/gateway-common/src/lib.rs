//! # gateway-common
//!
//! Shared utilities including configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, IdentifyConfig,
    RateLimitConfig,
};
pub use error::{AppError, AppResult, ErrorReport};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    CounterSnapshot, Counters, NoopTelemetry, Telemetry, TelemetryError, TracingConfig,
    TracingError,
};
