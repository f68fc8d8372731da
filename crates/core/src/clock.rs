//! Wall-clock abstraction for lock expiry.
//!
//! Stores read time through [`Clock`] so tests can move time forward
//! without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::types::Timestamp;

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current UTC time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Starts at the time of construction and advances in whole milliseconds.
#[derive(Debug)]
pub struct ManualClock {
    origin: Timestamp,
    offset_ms: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin: Timestamp) -> Self {
        Self {
            origin,
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.offset_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.origin + chrono::Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }
}
