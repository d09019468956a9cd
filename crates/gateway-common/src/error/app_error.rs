//! Application error types
//!
//! Top-level error for the binary. Library crates keep their own error enums
//! and are folded into this one at the edge.

use crate::config::ConfigError;
use crate::telemetry::{TelemetryError, TracingError};
use serde::Serialize;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Observability errors
    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    // Gateway errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Gateway connection error: {0}")]
    Connection(String),

    #[error("Gateway protocol error: {0}")]
    Protocol(String),

    // Shutdown
    #[error("Shutdown requested")]
    Shutdown,

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::Config(_) => 78,
            Self::Authentication(_) => 77,
            Self::Connection(_) => 69,
            Self::Protocol(_) => 76,
            Self::Tracing(_) | Self::Telemetry(_) | Self::Internal(_) => 70,
        }
    }

    /// Get error code for structured log output
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Tracing(_) => "TRACING_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_FAILED",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Shutdown => "SHUTDOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether reconnecting could make this error go away
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }

    #[must_use]
    pub fn connection(msg: impl fmt::Display) -> Self {
        Self::Connection(msg.to_string())
    }

    #[must_use]
    pub fn protocol(msg: impl fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Error report emitted once when the process exits with a failure
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorReport {
    fn from(err: &AppError) -> Self {
        let details = match err {
            AppError::Internal(source) => Some(serde_json::json!({
                "chain": source.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
            })),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
            details,
        }
    }
}

impl From<AppError> for ErrorReport {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
