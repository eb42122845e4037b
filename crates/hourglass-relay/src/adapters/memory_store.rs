//! Process-local store backend.
//!
//! Keys live in a map behind one lock so a bulk set is visible all at once.
//! Channels are `tokio::sync::broadcast` senders created on first subscribe
//! and removed once their last subscription is dropped.
//! Suitable for a single relay instance; deployments with more than one
//! instance need the Redis backend so sessions on different instances share
//! channels.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::config::DEFAULT_CHANNEL_CAPACITY;
use crate::domain::hour::StoreSlot;
use crate::ports::store::{ChannelSubscription, SignalStore, StoreConnector, StoreError};

type ChannelMap = DashMap<String, broadcast::Sender<String>>;

/// In-memory key-value and pub/sub store
pub struct MemoryStore {
    slot: StoreSlot,
    entries: RwLock<HashMap<String, String>>,
    channels: Arc<ChannelMap>,
    channel_capacity: usize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(slot: StoreSlot, channel_capacity: usize) -> Self {
        Self {
            slot,
            entries: RwLock::new(HashMap::new()),
            channels: Arc::new(DashMap::new()),
            channel_capacity: channel_capacity.max(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of channels with at least one live subscription
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Make every operation fail with `StoreError::Unavailable` until reset
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("store {} is offline", self.slot)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    fn slot(&self) -> StoreSlot {
        self.slot
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_online()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn erase_all(&self) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut map = self.entries.write();
        let erased = map.len();
        map.clear();
        debug!(slot = %self.slot, erased, "Memory store erased");
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let delivered = match self.channels.get(channel) {
            // No receivers is not an error: the message is simply lost
            Some(sender) => sender.send(payload.to_owned()).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.channels
                .remove_if(channel, |_, sender| sender.receiver_count() == 0);
        }
        Ok(delivered)
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError> {
        self.ensure_online()?;
        let receiver = self
            .channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe();

        let subscriber = Subscriber {
            channel: channel.to_owned(),
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        };
        let stream = futures::stream::unfold(subscriber, |mut subscriber| async move {
            loop {
                let received = match subscriber.receiver.as_mut() {
                    Some(receiver) => receiver.recv().await,
                    None => return None,
                };
                match received {
                    Ok(payload) => return Some((payload, subscriber)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            channel = %subscriber.channel,
                            skipped,
                            "Subscriber lagged, messages dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn subscriber_count(&self, channel: &str) -> Result<usize, StoreError> {
        self.ensure_online()?;
        Ok(self
            .channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0))
    }
}

/// One subscription's receiver. Dropping the last one for a channel removes
/// the channel's sender from the map.
struct Subscriber {
    channel: String,
    receiver: Option<broadcast::Receiver<String>>,
    channels: Arc<ChannelMap>,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        // Receiver must be gone before the count is checked
        drop(self.receiver.take());
        self.channels
            .remove_if(&self.channel, |_, sender| sender.receiver_count() == 0);
    }
}

/// Connector handing out one pre-built `MemoryStore` per slot.
///
/// Counts `connect` calls so callers can verify lazy initialization.
pub struct MemoryConnector {
    store_a: Arc<MemoryStore>,
    store_b: Arc<MemoryStore>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            store_a: Arc::new(MemoryStore::new(StoreSlot::A, channel_capacity)),
            store_b: Arc::new(MemoryStore::new(StoreSlot::B, channel_capacity)),
            connects: AtomicUsize::new(0),
        }
    }

    /// The store behind `slot`, without counting as a connect
    pub fn store(&self, slot: StoreSlot) -> Arc<MemoryStore> {
        match slot {
            StoreSlot::A => Arc::clone(&self.store_a),
            StoreSlot::B => Arc::clone(&self.store_b),
        }
    }

    /// Number of `connect` calls so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, slot: StoreSlot) -> Result<Arc<dyn SignalStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let store: Arc<dyn SignalStore> = self.store(slot);
        Ok(store)
    }
}
