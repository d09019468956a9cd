//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables.

use gateway_common::{
    try_init_tracing, try_init_tracing_with_config, AppConfig, AppError, ErrorReport, TracingConfig,
};
use tracing::error;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            if let Err(e) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {e}");
            }
            exit_with(&AppError::from(e));
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = gateway_client::run(config).await {
        exit_with(&e);
    }
}

fn exit_with(err: &AppError) -> ! {
    let report = ErrorReport::from(err);
    match serde_json::to_string(&report) {
        Ok(json) => error!(report = %json, "Gateway client stopped"),
        Err(_) => error!(error = %err, "Gateway client stopped"),
    }
    std::process::exit(report.exit_code);
}
