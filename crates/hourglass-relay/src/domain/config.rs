//! Relay configuration with validation.

use crate::domain::hour::StoreSlot;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// Default inbound WebSocket message limit (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default per-channel buffer for the in-memory store
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Main relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Backing store configuration
    pub stores: StoreConfig,
    /// Rotation host configuration
    pub rotation: RotationConfig,
    /// Relay session limits
    pub relay: RelayLimits,
}

impl RelayConfig {
    /// Validate configuration.
    ///
    /// Store URLs are only checked for presence here. They are parsed when the
    /// store is first selected, so a malformed URL fails that request instead
    /// of startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stores.backend == StoreBackend::Redis {
            if self.stores.store_a_url.trim().is_empty() {
                return Err(ConfigError::MissingStoreAddress(StoreSlot::A));
            }
            if self.stores.store_b_url.trim().is_empty() {
                return Err(ConfigError::MissingStoreAddress(StoreSlot::B));
            }
            // Erasing one store must never touch the other
            if self.stores.store_a_url.trim() == self.stores.store_b_url.trim() {
                return Err(ConfigError::SharedStoreAddress);
            }
        }

        if self.relay.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.relay.channel_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "channel_capacity cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Directory of static client assets served as the fallback route
    pub static_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            static_dir: None,
        }
    }
}

/// Which implementation backs the two stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Two independent Redis databases
    #[default]
    Redis,
    /// Process-local stores, for single-instance development
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid(format!("unknown store backend: {other}"))),
        }
    }
}

/// Backing store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Address of store A (odd hours)
    pub store_a_url: String,
    /// Address of store B (even hours)
    pub store_b_url: String,
}

impl StoreConfig {
    /// Configured address for `slot`
    pub fn url_for(&self, slot: StoreSlot) -> &str {
        match slot {
            StoreSlot::A => &self.store_a_url,
            StoreSlot::B => &self.store_b_url,
        }
    }
}

/// Rotation host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Run the half-past-the-hour erase scheduler in this process.
    /// Exactly one instance per deployment should enable this.
    pub enabled: bool,
}

/// Relay session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayLimits {
    /// Max inbound WebSocket message size in bytes
    pub max_message_size: usize,
    /// Per-channel buffer for the in-memory store backend
    pub channel_capacity: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Redis backend selected without an address for a store
    #[error("no address configured for store {0}")]
    MissingStoreAddress(StoreSlot),
    /// Both stores point at the same address
    #[error("store A and store B must use different addresses")]
    SharedStoreAddress,
    /// Invalid size or capacity limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
