//! Time source abstraction
//!
//! The scheduler asks a [`Clock`] for the current local date and time
//! instead of reading the system clock directly, so tests and rehearsal
//! runs can position the engine anywhere in the school day. All times in
//! this domain are local wall-clock times; nothing here is
//! timezone-aware.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Source of the current local date and time.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Time of day, the input to window classification.
    fn time_of_day(&self) -> NaiveTime {
        self.now().time()
    }

    /// Calendar date, the input to artifact and journal folder names.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock, shared by cloning.
///
/// Every clone observes the same instant; setting the time on one handle
/// is visible through all of them.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Replaces the current instant.
    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    /// Moves to a new time of day on the same date.
    pub fn set_time(&self, time: NaiveTime) {
        let mut guard = self.lock();
        *guard = NaiveDateTime::new(guard.date(), time);
    }

    /// Advances the clock by a delta (negative deltas move it back).
    pub fn advance(&self, delta: TimeDelta) {
        let mut guard = self.lock();
        *guard += delta;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_manual_clock_is_shared_across_clones() {
        let clock = ManualClock::starting_at(at(9, 0, 0));
        let other = clock.clone();

        other.set_time(NaiveTime::from_hms_opt(9, 31, 0).unwrap());

        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(9, 31, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_at(at(9, 44, 55));

        clock.advance(TimeDelta::seconds(5));

        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(9, 45, 0).unwrap());
    }

    #[test]
    fn test_system_clock_is_sane() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
