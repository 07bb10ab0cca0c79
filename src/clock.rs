//! Wall-clock abstraction.
//!
//! Rate windows, cache TTLs and session expiry are all computed against a
//! [`Clock`] so that tests can drive time forward without sleeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current unix time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the unix epoch.
    fn now(&self) -> Duration;

    /// Current unix time in milliseconds.
    fn now_millis(&self) -> u64 {
        self.now().as_millis() as u64
    }

    /// Current unix time in whole seconds.
    fn now_secs(&self) -> u64 {
        self.now().as_secs()
    }
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            millis: AtomicU64::new(start.as_millis() as u64),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.millis.store(to.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Duration::from_secs(100));
        assert_eq!(clock.now_secs(), 100);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now_millis(), 101_500);
        assert_eq!(clock.now_secs(), 101);

        clock.set(Duration::from_secs(5));
        assert_eq!(clock.now_secs(), 5);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
