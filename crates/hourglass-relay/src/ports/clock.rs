//! Wall-clock port.
//!
//! Every hour-bucket decision reads time through this trait so tests can pin it.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::hour::{hour_of, validate_hour_window, HourError, HourId};

/// Time source trait for testability
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC hour bucket
    fn current_hour(&self) -> HourId {
        hour_of(self.now())
    }

    /// Accept `hour_id` iff it is the current or the previous bucket
    fn validate_hour_id(&self, hour_id: HourId) -> Result<(), HourError> {
        validate_hour_window(hour_id, self.current_hour())
    }
}

/// System time implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with one-second resolution
#[derive(Debug, Default)]
pub struct ManualClock {
    unix_seconds: AtomicI64,
}

impl ManualClock {
    /// Clock positioned `seconds_into_hour` into hour bucket `hour_id`
    pub fn at_hour(hour_id: HourId, seconds_into_hour: i64) -> Self {
        Self {
            unix_seconds: AtomicI64::new(hour_id * 3600 + seconds_into_hour),
        }
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.unix_seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.unix_seconds.load(Ordering::SeqCst);
        // Out-of-range timestamps clamp to the epoch rather than panic
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
