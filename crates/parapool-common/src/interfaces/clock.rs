//! Time source
//!
//! All accrual is lazy: nothing runs on a timer, every entry point reads
//! `now()` once and settles elapsed interest from it.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::Timestamp;

/// Externally observed monotonic clock
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock (UTC seconds)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and scripted simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move time forward by `seconds`
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds.max(0), Ordering::SeqCst);
    }

    /// Jump to `timestamp`; ignored if it would move time backwards
    pub fn set(&self, timestamp: Timestamp) {
        self.now.fetch_max(timestamp, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1_000);
        clock.advance(50);
        assert_eq!(clock.now(), 1_050);

        clock.set(900);
        assert_eq!(clock.now(), 1_050);

        clock.advance(-10);
        assert_eq!(clock.now(), 1_050);
    }

    #[test]
    fn test_system_clock_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
