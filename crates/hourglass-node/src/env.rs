//! Relay configuration from environment variables.
//!
//! Unset variables keep the `RelayConfig` defaults. A set but unparsable
//! variable is an error rather than silently ignored.

use hourglass_relay::domain::ConfigError;
use hourglass_relay::{RelayConfig, StoreBackend};
use std::path::PathBuf;
use std::str::FromStr;

pub const HTTP_HOST: &str = "HOURGLASS_HTTP_HOST";
pub const HTTP_PORT: &str = "HOURGLASS_HTTP_PORT";
pub const STATIC_DIR: &str = "HOURGLASS_STATIC_DIR";
pub const STORE_BACKEND: &str = "HOURGLASS_STORE_BACKEND";
pub const STORE_A_URL: &str = "HOURGLASS_STORE_A_URL";
pub const STORE_B_URL: &str = "HOURGLASS_STORE_B_URL";
pub const ROTATION_HOST: &str = "HOURGLASS_ROTATION_HOST";
pub const MAX_MESSAGE_SIZE: &str = "HOURGLASS_MAX_MESSAGE_SIZE";
pub const CHANNEL_CAPACITY: &str = "HOURGLASS_CHANNEL_CAPACITY";
pub const LOG_JSON: &str = "HOURGLASS_LOG_JSON";

/// Load configuration from the process environment
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_config_from(|name| std::env::var(name).ok())
}

/// Load configuration through `lookup`, which returns a variable's value if set
pub fn load_config_from<F>(lookup: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    let mut config = RelayConfig::default();

    if let Some(host) = var(HTTP_HOST) {
        config.http.host = parse(HTTP_HOST, &host)?;
    }
    if let Some(port) = var(HTTP_PORT) {
        config.http.port = parse(HTTP_PORT, &port)?;
    }
    if let Some(dir) = var(STATIC_DIR) {
        config.http.static_dir = Some(PathBuf::from(dir));
    }
    if let Some(backend) = var(STORE_BACKEND) {
        config.stores.backend = StoreBackend::from_str(&backend)?;
    }
    if let Some(url) = var(STORE_A_URL) {
        config.stores.store_a_url = url;
    }
    if let Some(url) = var(STORE_B_URL) {
        config.stores.store_b_url = url;
    }
    if let Some(flag) = var(ROTATION_HOST) {
        config.rotation.enabled = parse_flag(ROTATION_HOST, &flag)?;
    }
    if let Some(size) = var(MAX_MESSAGE_SIZE) {
        config.relay.max_message_size = parse(MAX_MESSAGE_SIZE, &size)?;
    }
    if let Some(capacity) = var(CHANNEL_CAPACITY) {
        config.relay.channel_capacity = parse(CHANNEL_CAPACITY, &capacity)?;
    }

    Ok(config)
}

/// Whether JSON log output is requested
pub fn json_logs_from<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LOG_JSON)
        .and_then(|value| parse_flag(LOG_JSON, &value).ok())
        .unwrap_or(false)
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{name}={value:?}: {e}")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{name}={value:?}: expected true or false"
        ))),
    }
}
