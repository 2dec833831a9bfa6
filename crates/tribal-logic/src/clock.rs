//! Time source for accrual.
//!
//! All wall-clock reads go through [`Clock`] so tests can pin time with
//! [`ManualClock`] and the SpacetimeDB module can feed the reducer timestamp.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const UNIX_EPOCH: Timestamp = Timestamp(0);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SECOND)
    }

    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn plus_secs(&self, secs: i64) -> Timestamp {
        Timestamp(self.0.saturating_add(secs.saturating_mul(MICROS_PER_SECOND)))
    }

    /// Whole minutes elapsed from `earlier` to `self`, truncated.
    /// Zero when `earlier` is not actually earlier.
    pub fn whole_minutes_since(&self, earlier: Timestamp) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta <= 0 {
            0
        } else {
            (delta / MICROS_PER_MINUTE) as u64
        }
    }
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros().min(i64::MAX as u128) as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

/// A clock that only moves when told to. Shareable across threads.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicI64::new(start.as_micros()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.as_micros(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.micros
            .fetch_add(secs.saturating_mul(MICROS_PER_SECOND), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.micros.load(Ordering::SeqCst))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_minutes_truncate() {
        let t0 = Timestamp::from_secs(1_000);
        assert_eq!(t0.plus_secs(59).whole_minutes_since(t0), 0);
        assert_eq!(t0.plus_secs(60).whole_minutes_since(t0), 1);
        assert_eq!(t0.plus_secs(619).whole_minutes_since(t0), 10);
    }

    #[test]
    fn test_backwards_time_is_zero() {
        let t0 = Timestamp::from_secs(1_000);
        assert_eq!(t0.whole_minutes_since(t0.plus_secs(600)), 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Timestamp::from_secs(10));
        clock.advance_secs(50);
        assert_eq!(clock.now(), Timestamp::from_secs(60));
        clock.set(Timestamp::UNIX_EPOCH);
        assert_eq!(clock.now().as_micros(), 0);
    }

    #[test]
    fn test_system_clock_after_epoch() {
        assert!(SystemClock.now() > Timestamp::UNIX_EPOCH);
    }
}
