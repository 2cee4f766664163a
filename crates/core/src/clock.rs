//! Wall-clock sources.

use time::OffsetDateTime;

/// Source of the reference time used by time-dependent filters.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the system's UTC time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a single instant, for deterministic evaluation.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(OffsetDateTime);

impl FixedClock {
    pub fn new(at: OffsetDateTime) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_fixed_clock_never_moves() {
        let clock = FixedClock::new(datetime!(2024-06-01 12:00:00 UTC));
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), datetime!(2024-06-01 12:00:00 UTC));
    }

    #[test]
    fn test_system_clock_is_utc() {
        assert!(SystemClock.now().offset().is_utc());
    }
}
