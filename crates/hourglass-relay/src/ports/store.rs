//! Backing store port.
//!
//! A store is a key-value map plus publish/subscribe channels. Two independent
//! instances exist, selected by hour parity.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::domain::hour::StoreSlot;

/// Messages received on one subscribed channel.
///
/// Dropping the stream releases the subscription.
pub type ChannelSubscription = BoxStream<'static, String>;

/// Capabilities the relay needs from a backing store
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Which of the two stores this is
    fn slot(&self) -> StoreSlot;

    /// Set every `(key, value)` pair in one call. All pairs become visible
    /// together or none do.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError>;

    /// Read one key. `Ok(None)` means not found.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove every key in the store
    async fn erase_all(&self) -> Result<(), StoreError>;

    /// Publish `payload` to `channel`, returning how many subscribers got it
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, StoreError>;

    /// Subscribe to `channel`. Returns once the subscription is active.
    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError>;

    /// Number of live subscriptions on `channel`
    async fn subscriber_count(&self, channel: &str) -> Result<usize, StoreError>;
}

/// Opens the connection for a store slot
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, slot: StoreSlot) -> Result<Arc<dyn SignalStore>, StoreError>;
}

/// Backing store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The configured address for a store could not be parsed
    #[error("invalid address for store {slot}: {reason}")]
    InvalidAddress { slot: StoreSlot, reason: String },

    /// Could not reach the store
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed a command
    #[error("store command failed: {0}")]
    Command(String),

    /// Subscribing to a channel failed
    #[error("subscribe {channel:?} failed: {reason}")]
    Subscribe { channel: String, reason: String },
}
