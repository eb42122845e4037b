//! Ports for the relay.
//!
//! Clock, backing store and client connection abstractions. Implementations
//! live in `crate::adapters`.

pub mod clock;
pub mod connection;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{ConnectionError, FrameSink, FrameSource};
pub use store::{ChannelSubscription, SignalStore, StoreConnector, StoreError};
