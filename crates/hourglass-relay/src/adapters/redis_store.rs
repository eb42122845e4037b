//! Redis store backend.
//!
//! Each slot is its own Redis database. Key-value commands share one
//! multiplexed connection per store; every channel subscription opens a
//! dedicated pub/sub connection that is closed when the subscription stream is
//! dropped.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::config::StoreConfig;
use crate::domain::hour::StoreSlot;
use crate::ports::store::{ChannelSubscription, SignalStore, StoreConnector, StoreError};

/// One Redis-backed store
pub struct RedisStore {
    slot: StoreSlot,
    client: redis::Client,
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Parse `url` and open the multiplexed connection
    pub async fn connect(slot: StoreSlot, url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::InvalidAddress {
            slot,
            reason: e.to_string(),
        })?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!(slot = %slot, "Connected to Redis store");
        Ok(Self {
            slot,
            client,
            connection,
        })
    }
}

#[async_trait]
impl SignalStore for RedisStore {
    fn slot(&self) -> StoreSlot {
        self.slot
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        // MSET is atomic: all pairs are set together
        let _: () = conn.mset(entries).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn erase_all(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        let receivers: usize = conn.publish(channel, payload).await?;
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError> {
        let subscribe_err = |e: redis::RedisError| StoreError::Subscribe {
            channel: channel.to_owned(),
            reason: e.to_string(),
        };
        let mut pubsub = self.client.get_async_pubsub().await.map_err(subscribe_err)?;
        // Resolves after the SUBSCRIBE acknowledgement
        pubsub.subscribe(channel).await.map_err(subscribe_err)?;
        debug!(slot = %self.slot, channel = %channel, "Subscribed");

        let channel = channel.to_owned();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let decoded = msg.get_payload::<String>();
            let channel = channel.clone();
            async move {
                match decoded {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping undecodable channel message");
                        None
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn subscriber_count(&self, channel: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        let counts: HashMap<String, usize> = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(channel)
            .query_async(&mut conn)
            .await?;
        Ok(counts.get(channel).copied().unwrap_or(0))
    }
}

/// Connects slots to the addresses in `StoreConfig`
pub struct RedisConnector {
    config: StoreConfig,
}

impl RedisConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, slot: StoreSlot) -> Result<Arc<dyn SignalStore>, StoreError> {
        let store = RedisStore::connect(slot, self.config.url_for(slot)).await?;
        Ok(Arc::new(store))
    }
}
