//! Application configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub identify: IdentifyConfig,
    pub rate_limit: RateLimitConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway connection settings
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    pub token: String,
    /// Maximum number of concurrently running message handlers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upper bound for draining queued messages on shutdown
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("workers", &self.workers)
            .field("shutdown_grace_ms", &self.shutdown_grace_ms)
            .finish()
    }
}

/// Values sent in the Identify handshake
#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyConfig {
    #[serde(default = "default_os")]
    pub os: String,
    #[serde(default = "default_client_name")]
    pub browser: String,
    #[serde(default = "default_client_name")]
    pub device: String,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    #[serde(default)]
    pub shard_id: u32,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub activity: Option<String>,
}

/// Token bucket settings for outbound messages and dials
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_message_period_ms")]
    pub message_period_ms: u64,
    #[serde(default = "default_message_burst")]
    pub message_burst: u32,
    #[serde(default = "default_connect_period_ms")]
    pub connect_period_ms: u64,
    #[serde(default = "default_connect_burst")]
    pub connect_burst: u32,
}

impl RateLimitConfig {
    #[must_use]
    pub fn message_period(&self) -> Duration {
        Duration::from_millis(self.message_period_ms)
    }

    #[must_use]
    pub fn connect_period(&self) -> Duration {
        Duration::from_millis(self.connect_period_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            message_period_ms: default_message_period_ms(),
            message_burst: default_message_burst(),
            connect_period_ms: default_connect_period_ms(),
            connect_burst: default_connect_burst(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "gateway-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=etf".to_string()
}

fn default_workers() -> usize {
    20
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_os() -> String {
    env::consts::OS.to_string()
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_large_threshold() -> u32 {
    250
}

fn default_shard_count() -> u32 {
    1
}

fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_status() -> String {
    "online".to_string()
}

fn default_message_period_ms() -> u64 {
    500 // 120 per minute
}

fn default_message_burst() -> u32 {
    120
}

fn default_connect_period_ms() -> u64 {
    5_000
}

fn default_connect_burst() -> u32 {
    1
}

/// Parse an optional variable, falling back to `default` when unset
fn parsed<T, L>(lookup: &L, name: &'static str, default: impl FnOnce() -> T) -> Result<T, ConfigError>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(default()),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                token: lookup("GATEWAY_TOKEN")
                    .filter(|token| !token.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?,
                workers: parsed(&lookup, "GATEWAY_WORKERS", default_workers)?,
                shutdown_grace_ms: parsed(
                    &lookup,
                    "GATEWAY_SHUTDOWN_GRACE_MS",
                    default_shutdown_grace_ms,
                )?,
            },
            identify: IdentifyConfig {
                os: lookup("CLIENT_OS").unwrap_or_else(default_os),
                browser: lookup("CLIENT_BROWSER").unwrap_or_else(default_client_name),
                device: lookup("CLIENT_DEVICE").unwrap_or_else(default_client_name),
                large_threshold: parsed(
                    &lookup,
                    "GATEWAY_LARGE_THRESHOLD",
                    default_large_threshold,
                )?,
                shard_id: parsed(&lookup, "GATEWAY_SHARD_ID", || 0)?,
                shard_count: parsed(&lookup, "GATEWAY_SHARD_COUNT", default_shard_count)?,
                intents: parsed(&lookup, "GATEWAY_INTENTS", default_intents)?,
                status: lookup("GATEWAY_STATUS").unwrap_or_else(default_status),
                activity: lookup("GATEWAY_ACTIVITY").filter(|s| !s.is_empty()),
            },
            rate_limit: RateLimitConfig {
                message_period_ms: parsed(
                    &lookup,
                    "RATE_LIMIT_MESSAGE_PERIOD_MS",
                    default_message_period_ms,
                )?,
                message_burst: parsed(&lookup, "RATE_LIMIT_MESSAGE_BURST", default_message_burst)?,
                connect_period_ms: parsed(
                    &lookup,
                    "RATE_LIMIT_CONNECT_PERIOD_MS",
                    default_connect_period_ms,
                )?,
                connect_burst: parsed(&lookup, "RATE_LIMIT_CONNECT_BURST", default_connect_burst)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.workers == 0 {
            return Err(ConfigError::InvalidValue("GATEWAY_WORKERS", "0".to_string()));
        }
        if self.identify.shard_count == 0 || self.identify.shard_id >= self.identify.shard_count {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_SHARD_ID",
                format!("{}/{}", self.identify.shard_id, self.identify.shard_count),
            ));
        }
        if self.rate_limit.message_period_ms == 0 || self.rate_limit.message_burst == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_MESSAGE_BURST",
                format!(
                    "{} per {}ms",
                    self.rate_limit.message_burst, self.rate_limit.message_period_ms
                ),
            ));
        }
        if self.rate_limit.connect_period_ms == 0 || self.rate_limit.connect_burst == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_CONNECT_BURST",
                format!(
                    "{} per {}ms",
                    self.rate_limit.connect_burst, self.rate_limit.connect_period_ms
                ),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_environment_is_development() {
        assert!(Environment::Development.is_development());
        assert!(!Environment::Staging.is_development());
        assert!(!Environment::Production.is_development());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("GATEWAY_TOKEN", "abc")])).unwrap();

        assert_eq!(config.gateway.token, "abc");
        assert_eq!(config.gateway.workers, 20);
        assert_eq!(config.gateway.shutdown_grace(), Duration::from_secs(5));
        assert!(config.gateway.url.contains("encoding=etf"));
        assert_eq!(config.identify.large_threshold, 250);
        assert_eq!(config.identify.shard_count, 1);
        assert_eq!(config.identify.status, "online");
        assert!(config.identify.activity.is_none());
        assert_eq!(config.rate_limit.message_period(), Duration::from_millis(500));
        assert_eq!(config.rate_limit.message_burst, 120);
        assert_eq!(config.rate_limit.connect_period(), Duration::from_secs(5));
        assert_eq!(config.rate_limit.connect_burst, 1);
        assert_eq!(config.app.env, Environment::Development);
    }

    #[test]
    fn test_missing_token() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GATEWAY_TOKEN")));

        let err = AppConfig::from_lookup(lookup_from(&[("GATEWAY_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GATEWAY_TOKEN")));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GATEWAY_TOKEN", "abc"),
            ("APP_ENV", "Production"),
            ("GATEWAY_WORKERS", "3"),
            ("GATEWAY_SHARD_ID", "1"),
            ("GATEWAY_SHARD_COUNT", "2"),
            ("GATEWAY_ACTIVITY", "testing"),
            ("CLIENT_OS", "linux"),
        ]))
        .unwrap();

        assert!(config.app.env.is_production());
        assert_eq!(config.gateway.workers, 3);
        assert_eq!(config.identify.shard_id, 1);
        assert_eq!(config.identify.shard_count, 2);
        assert_eq!(config.identify.activity.as_deref(), Some("testing"));
        assert_eq!(config.identify.os, "linux");
    }

    #[test]
    fn test_invalid_number() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("GATEWAY_TOKEN", "abc"),
            ("GATEWAY_WORKERS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GATEWAY_WORKERS", _)));
    }

    #[test]
    fn test_validate_rejects_zero_workers_and_bad_shard() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("GATEWAY_TOKEN", "abc"),
            ("GATEWAY_WORKERS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GATEWAY_WORKERS", _)));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("GATEWAY_TOKEN", "abc"),
            ("GATEWAY_SHARD_ID", "2"),
            ("GATEWAY_SHARD_COUNT", "2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GATEWAY_SHARD_ID", _)));
    }

    #[test]
    fn test_token_is_redacted() {
        let config = AppConfig::from_lookup(lookup_from(&[("GATEWAY_TOKEN", "secret")])).unwrap();
        let debug = format!("{:?}", config.gateway);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
