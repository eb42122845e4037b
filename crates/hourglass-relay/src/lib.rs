//! Hourglass relay: hour-rotated pseudonym registry and WebSocket signaling relay.
//!
//! Clients register short-lived `pseudonym -> identity` mappings and exchange
//! handshake messages addressed by pseudonym. The server keeps nothing beyond
//! a bounded window.
//!
//! # Architecture
//!
//! ```text
//!   POST /register            GET /ws?room=<name>
//!        │                           │
//!  ┌─────┴──────────┐      ┌─────────┴──────────┐
//!  │ PseudonymReg.  │      │   RelaySession     │  one per connection,
//!  │ validate + set │      │ store ⇄ connection │  two pumps
//!  └─────┬──────────┘      └─────────┬──────────┘
//!        │                           │
//!  ┌─────┴───────────────────────────┴──────┐      ┌──────────────────┐
//!  │            DualStoreRouter             │◄─────│ RotationScheduler│
//!  │   odd hour → store A, even → store B   │      │ erase at :30     │
//!  └─────┬───────────────────────────┬──────┘      └──────────────────┘
//!        │                           │
//!     store A                     store B
//! ```
//!
//! # Erasure
//!
//! Registrations land in the store for the caller's hour bucket. At minute 30
//! of every hour the rotation host erases the store for the current hour, so
//! each store is wiped once in every hour of its own parity.
//!
//! # Usage
//!
//! ```ignore
//! use hourglass_relay::{RelayConfig, RelayService};
//!
//! let config = RelayConfig::default();
//! let service = RelayService::new(config)?;
//! service.serve().await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod registrar;
pub mod relay;
pub mod rotation;
pub mod router;
pub mod service;

// Re-exports
pub use domain::config::{
    HttpConfig, RelayConfig, RelayLimits, RotationConfig, StoreBackend, StoreConfig,
};
pub use domain::error::{ApiError, RelayError};
pub use domain::hour::{HourError, HourId, StoreSlot};
pub use domain::pseudonym::{KeyFormatError, PseudonymKey};
pub use ports::clock::{Clock, ManualClock, SystemClock};
pub use ports::store::{SignalStore, StoreConnector, StoreError};
pub use registrar::{PseudonymRegistrar, RegistrationError};
pub use relay::{RelaySession, SessionError, SessionState};
pub use rotation::{RotationError, RotationScheduler};
pub use router::DualStoreRouter;
pub use service::RelayService;
