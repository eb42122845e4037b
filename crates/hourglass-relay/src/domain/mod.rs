//! Domain types for the relay.
//!
//! Hour buckets, pseudonym keys, configuration and error types. Store and
//! connection I/O lives behind the traits in `crate::ports`.

pub mod config;
pub mod error;
pub mod hour;
pub mod pseudonym;
pub mod session_id;

// Re-exports for convenience
pub use config::{ConfigError, RelayConfig, StoreBackend};
pub use error::{ApiError, ApiResult, RelayError};
pub use hour::{hour_of, validate_hour_window, HourError, HourId, StoreSlot};
pub use pseudonym::{KeyFormatError, PseudonymKey, MAX_CONTACT_KEYS, PSEUDONYM_KEY_LEN};
pub use session_id::SessionId;
