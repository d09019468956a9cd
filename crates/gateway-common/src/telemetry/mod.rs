//! Telemetry and tracing setup

mod counters;
mod tracing_setup;

pub use counters::{CounterSnapshot, Counters, NoopTelemetry, Telemetry, TelemetryError};
pub use tracing_setup::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
