//! Clock adapters for the `TimeSource` port.

use crate::ports::TimeSource;
use parking_lot::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock, seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    current_time: RwLock<u64>,
}

impl ManualClock {
    /// Clock starting at `start`.
    pub fn new(start: u64) -> Self {
        Self {
            current_time: RwLock::new(start),
        }
    }

    /// Set current time.
    pub fn set_time(&self, time: u64) {
        *self.current_time.write() = time;
    }

    /// Advance time.
    pub fn advance_time(&self, secs: u64) {
        let mut current = self.current_time.write();
        *current = current.saturating_add(secs);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_700_000_000)
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        *self.current_time.read()
    }
}
