//! Rotation scheduler: erases the current hour's store at half past every hour.
//!
//! A store only receives writes for hours of its own parity, and each erase
//! clears the store selected by the hour in which it runs. Every mapping is
//! therefore gone by the second half-past mark after it was written.
//!
//! Erase failures are returned to the caller, which must stop the process: a
//! rotation host that cannot erase must not keep serving.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::hour::{HourId, StoreSlot};
use crate::ports::store::StoreError;
use crate::router::DualStoreRouter;

/// Offset of each erase within the hour
pub const ROTATION_OFFSET_MINUTES: i64 = 30;

/// Interval between erases
pub const ROTATION_PERIOD: Duration = Duration::from_secs(3600);

/// Next instant at minute 30 of an hour, at or after `now`
pub fn next_half_past(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour_start = now
        .duration_trunc(ChronoDuration::hours(1))
        .unwrap_or(now);
    let candidate = hour_start + ChronoDuration::minutes(ROTATION_OFFSET_MINUTES);
    if now > candidate {
        candidate + ChronoDuration::hours(1)
    } else {
        candidate
    }
}

/// Rotation errors. Both are fatal to the rotation host.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RotationError {
    #[error("failed to resolve store {slot} for hour {hour_id}: {source}")]
    Resolve {
        hour_id: HourId,
        slot: StoreSlot,
        #[source]
        source: StoreError,
    },
    #[error("failed to erase store {slot} for hour {hour_id}: {source}")]
    Erase {
        hour_id: HourId,
        slot: StoreSlot,
        #[source]
        source: StoreError,
    },
}

/// Periodic erase of the current hour's store
pub struct RotationScheduler {
    router: Arc<DualStoreRouter>,
}

impl RotationScheduler {
    pub fn new(router: Arc<DualStoreRouter>) -> Self {
        Self { router }
    }

    /// Erase every key in the store selected by the current hour
    pub async fn erase_current(&self) -> Result<StoreSlot, RotationError> {
        let hour_id = self.router.current_hour();
        let slot = StoreSlot::for_hour(hour_id);
        info!(hour_id, slot = %slot, "Running rotation erase");

        let store = self
            .router
            .select(hour_id)
            .await
            .map_err(|source| RotationError::Resolve {
                hour_id,
                slot,
                source,
            })?;
        store
            .erase_all()
            .await
            .map_err(|source| RotationError::Erase {
                hour_id,
                slot,
                source,
            })?;

        info!(hour_id, slot = %slot, "Store erased");
        Ok(slot)
    }

    /// Run until `shutdown` is cancelled or an erase fails.
    ///
    /// Sleeps until the next half-past mark, erases, then erases again every
    /// hour. A stalled process delays ticks; missed ticks are not replayed.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), RotationError> {
        let now = self.router.clock().now();
        let first = next_half_past(now);
        let delay = (first - now).to_std().unwrap_or(Duration::ZERO);
        info!(
            first_erase = %first,
            delay_secs = delay.as_secs(),
            "Rotation scheduler started"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Rotation scheduler stopped before first erase");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Err(e) = self.erase_current().await {
            error!(error = %e, "Rotation erase failed");
            return Err(e);
        }

        let mut ticker =
            tokio::time::interval_at(Instant::now() + ROTATION_PERIOD, ROTATION_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Rotation scheduler stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.erase_current().await {
                        error!(error = %e, "Rotation erase failed");
                        return Err(e);
                    }
                }
            }
        }
    }
}
