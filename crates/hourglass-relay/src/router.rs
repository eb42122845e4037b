//! Dual-store router.
//!
//! Maps an hour bucket to one of the two backing stores by parity and owns the
//! lazily created store connections. Built once at startup and shared by the
//! registrar, every relay session and the rotation scheduler.

use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::domain::hour::{HourError, HourId, StoreSlot};
use crate::ports::clock::Clock;
use crate::ports::store::{SignalStore, StoreConnector, StoreError};

pub struct DualStoreRouter {
    connector: Arc<dyn StoreConnector>,
    clock: Arc<dyn Clock>,
    store_a: OnceCell<Arc<dyn SignalStore>>,
    store_b: OnceCell<Arc<dyn SignalStore>>,
    /// Serializes first-use connection setup for both stores
    init_lock: Mutex<()>,
}

impl DualStoreRouter {
    pub fn new(connector: Arc<dyn StoreConnector>, clock: Arc<dyn Clock>) -> Self {
        Self {
            connector,
            clock,
            store_a: OnceCell::new(),
            store_b: OnceCell::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Store for `hour_id`: odd hours use store A, even hours store B.
    ///
    /// The first call for a slot opens its connection. A failed attempt leaves
    /// the slot empty so a later call can retry.
    pub async fn select(&self, hour_id: HourId) -> Result<Arc<dyn SignalStore>, StoreError> {
        self.store(Self::slot_for(hour_id)).await
    }

    /// Slot that `select(hour_id)` resolves to, without connecting
    pub fn slot_for(hour_id: HourId) -> StoreSlot {
        StoreSlot::for_hour(hour_id)
    }

    /// Store for the current hour, along with that hour
    pub async fn current(&self) -> Result<(HourId, Arc<dyn SignalStore>), StoreError> {
        let hour_id = self.current_hour();
        let store = self.select(hour_id).await?;
        Ok((hour_id, store))
    }

    /// Store behind `slot`, connecting on first use
    pub async fn store(&self, slot: StoreSlot) -> Result<Arc<dyn SignalStore>, StoreError> {
        let cell = self.cell(slot);
        if let Some(store) = cell.get() {
            return Ok(Arc::clone(store));
        }

        let _guard = self.init_lock.lock().await;
        let store = cell
            .get_or_try_init(|| async {
                debug!(slot = %slot, "Opening store connection");
                let store = self.connector.connect(slot).await?;
                info!(slot = %slot, "Store connection ready");
                Ok::<_, StoreError>(store)
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// Whether `slot` already has a connection
    pub fn is_connected(&self, slot: StoreSlot) -> bool {
        self.cell(slot).initialized()
    }

    /// Current UTC hour bucket
    pub fn current_hour(&self) -> HourId {
        self.clock.current_hour()
    }

    /// Accept `hour_id` iff it is the current or previous bucket
    pub fn validate_hour_id(&self, hour_id: HourId) -> Result<(), HourError> {
        self.clock.validate_hour_id(hour_id)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn cell(&self, slot: StoreSlot) -> &OnceCell<Arc<dyn SignalStore>> {
        match slot {
            StoreSlot::A => &self.store_a,
            StoreSlot::B => &self.store_b,
        }
    }
}
