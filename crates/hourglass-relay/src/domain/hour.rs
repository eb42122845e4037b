//! Hour buckets and store slot selection.
//!
//! An hour bucket is `floor(unix_seconds / 3600)` in UTC. Registrations carry
//! the bucket the client believes is current; the server accepts the current
//! bucket and the one immediately before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in one hour bucket
pub const SECONDS_PER_HOUR: i64 = 3600;

/// UTC hour number since the Unix epoch
pub type HourId = i64;

/// Hour bucket containing `instant`
pub fn hour_of(instant: DateTime<Utc>) -> HourId {
    instant.timestamp().div_euclid(SECONDS_PER_HOUR)
}

/// Check that `hour_id` is `current` or `current - 1`.
pub fn validate_hour_window(hour_id: HourId, current: HourId) -> Result<(), HourError> {
    if hour_id == current || hour_id == current - 1 {
        Ok(())
    } else {
        Err(HourError::OutOfWindow {
            hour_id,
            current,
            previous: current - 1,
        })
    }
}

/// Hour validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HourError {
    /// The supplied hour is neither the current nor the previous bucket
    #[error("hourId {hour_id} is not valid, it should be {current} or {previous}")]
    OutOfWindow {
        hour_id: HourId,
        current: HourId,
        previous: HourId,
    },
}

/// One of the two backing stores.
///
/// Odd hours write to `A`, even hours to `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreSlot {
    A,
    B,
}

impl StoreSlot {
    /// Slot selected by the parity of `hour_id`
    pub fn for_hour(hour_id: HourId) -> Self {
        if hour_id.rem_euclid(2) == 1 {
            StoreSlot::A
        } else {
            StoreSlot::B
        }
    }
}

impl fmt::Display for StoreSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSlot::A => write!(f, "A"),
            StoreSlot::B => write!(f, "B"),
        }
    }
}
