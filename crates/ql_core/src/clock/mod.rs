//! Virtual clock.
//!
//! One persisted [`ClockState`] record is the only authority on "now". The
//! clock never caches a date across operations: every read loads the record,
//! every mutation persists before returning, so dependents always observe the
//! last committed value even after a crash or a failed write.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::store::Store;

/// The singleton persisted clock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    pub current_date: DateTime<Utc>,
    /// Virtual seconds per real second when auto-advance is on. 0 = paused.
    pub speed_multiplier: f64,
    pub auto_advance: bool,
}

impl ClockState {
    pub fn starting_at(date: DateTime<Utc>) -> Self {
        Self { current_date: date, speed_multiplier: DEFAULT_SPEED, auto_advance: false }
    }
}

/// Default virtual date for a fresh installation: season opener day.
pub fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
}

/// One real second advances one virtual minute by default.
pub const DEFAULT_SPEED: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// `None` when the amount does not fit in a `chrono::Duration`.
    pub fn to_duration(self, amount: i64) -> Option<Duration> {
        match self {
            TimeUnit::Minutes => Duration::try_minutes(amount),
            TimeUnit::Hours => Duration::try_hours(amount),
            TimeUnit::Days => Duration::try_days(amount),
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minute" | "minutes" => Some(TimeUnit::Minutes),
            "hour" | "hours" => Some(TimeUnit::Hours),
            "day" | "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

pub struct VirtualClock {
    store: Arc<dyn Store>,
}

impl VirtualClock {
    /// Open the clock, creating the singleton record on first boot.
    pub fn open(store: Arc<dyn Store>) -> Result<Self> {
        if store.load_clock()?.is_none() {
            let state = ClockState::starting_at(default_epoch());
            store.save_clock(&state)?;
            log::info!("virtual clock initialised at {}", state.current_date);
        }
        Ok(Self { store })
    }

    fn load(&self) -> Result<ClockState> {
        self.store
            .load_clock()?
            .ok_or_else(|| CoreError::Storage("clock record missing after initialisation".into()))
    }

    /// The persisted current virtual date. Never derived from wall-clock.
    pub fn current_date(&self) -> Result<DateTime<Utc>> {
        Ok(self.load()?.current_date)
    }

    pub fn state(&self) -> Result<ClockState> {
        self.load()
    }

    /// Move the clock forward. Forward-only: zero and negative amounts are
    /// rejected without touching the record.
    pub fn advance(&self, amount: i64, unit: TimeUnit) -> Result<DateTime<Utc>> {
        if amount <= 0 {
            return Err(CoreError::Validation(format!(
                "advance amount must be positive, got {amount}"
            )));
        }
        let delta = unit.to_duration(amount).ok_or_else(|| {
            CoreError::Validation(format!("advance amount out of range: {amount}"))
        })?;
        self.advance_by(delta)
    }

    /// Jump straight to `target`. Used by "advance to next match"; rejects
    /// targets earlier than the persisted date.
    ///
    /// The conditional store write means a writer that lost a race to a
    /// concurrent advance re-reads and re-checks instead of overwriting, so
    /// the persisted date never moves backward.
    pub fn advance_to(&self, target: DateTime<Utc>) -> Result<DateTime<Utc>> {
        loop {
            let state = self.load()?;
            if target < state.current_date {
                return Err(CoreError::ClockBackward {
                    current: state.current_date,
                    requested: target,
                });
            }
            if self.store.advance_clock(state.current_date, target)? {
                log::debug!("virtual clock advanced to {target}");
                return Ok(target);
            }
        }
    }

    /// Relative advance; retries recompute the target from the fresh date so
    /// two concurrent `+1h` calls land `+2h` ahead, not `+1h`.
    fn advance_by(&self, delta: Duration) -> Result<DateTime<Utc>> {
        loop {
            let state = self.load()?;
            let target = state.current_date.checked_add_signed(delta).ok_or_else(|| {
                CoreError::Validation(format!("advance by {delta} overflows the clock"))
            })?;
            if self.store.advance_clock(state.current_date, target)? {
                log::debug!("virtual clock advanced to {target}");
                return Ok(target);
            }
        }
    }

    pub fn set_speed(&self, multiplier: f64) -> Result<()> {
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(CoreError::Validation(format!(
                "speed multiplier must be a finite value >= 0, got {multiplier}"
            )));
        }
        self.store.set_clock_speed(multiplier)?;
        log::info!("virtual clock speed set to {multiplier}x");
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.set_auto_advance(false)
    }

    pub fn resume(&self) -> Result<()> {
        self.set_auto_advance(true)
    }

    fn set_auto_advance(&self, enabled: bool) -> Result<()> {
        let state = self.load()?;
        if state.auto_advance != enabled {
            self.store.set_clock_auto_advance(enabled)?;
            log::info!("virtual clock auto-advance {}", if enabled { "resumed" } else { "paused" });
        }
        Ok(())
    }

    /// Autonomous tick: convert elapsed real time into virtual time at the
    /// configured multiplier. A paused clock ticks to nowhere.
    pub fn tick(&self, real_elapsed: StdDuration) -> Result<Option<DateTime<Utc>>> {
        let state = self.load()?;
        if !state.auto_advance || state.speed_multiplier <= 0.0 {
            return Ok(None);
        }
        let virtual_secs = real_elapsed.as_secs_f64() * state.speed_multiplier;
        let delta = Duration::milliseconds((virtual_secs * 1000.0) as i64);
        if delta <= Duration::zero() {
            return Ok(None);
        }
        Ok(Some(self.advance_by(delta)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn clock() -> VirtualClock {
        VirtualClock::open(Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_first_boot_creates_record() {
        let store = Arc::new(MemoryStore::new());
        assert!(store.load_clock().unwrap().is_none());
        let clock = VirtualClock::open(store.clone()).unwrap();
        assert_eq!(clock.current_date().unwrap(), default_epoch());
        assert!(store.load_clock().unwrap().is_some());
    }

    #[test]
    fn test_advance_persists_and_returns_new_date() {
        let store = Arc::new(MemoryStore::new());
        let clock = VirtualClock::open(store.clone()).unwrap();
        let after = clock.advance(3, TimeUnit::Days).unwrap();
        assert_eq!(after, default_epoch() + Duration::days(3));
        // read-your-write through the store, not a cached copy
        assert_eq!(store.load_clock().unwrap().unwrap().current_date, after);
    }

    #[test]
    fn test_negative_advance_rejected_without_mutation() {
        let clock = clock();
        let before = clock.current_date().unwrap();
        let err = clock.advance(-5, TimeUnit::Hours).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(clock.current_date().unwrap(), before);
    }

    #[test]
    fn test_advance_to_rejects_backward_target() {
        let clock = clock();
        let now = clock.advance(1, TimeUnit::Days).unwrap();
        let err = clock.advance_to(now - Duration::hours(1)).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(clock.current_date().unwrap(), now);
    }

    #[test]
    fn test_tick_respects_pause_and_speed() {
        let clock = clock();
        // auto-advance off by default
        assert!(clock.tick(StdDuration::from_secs(10)).unwrap().is_none());

        clock.resume().unwrap();
        clock.set_speed(60.0).unwrap();
        let advanced = clock.tick(StdDuration::from_secs(10)).unwrap().unwrap();
        assert_eq!(advanced, default_epoch() + Duration::minutes(10));

        clock.set_speed(0.0).unwrap();
        assert!(clock.tick(StdDuration::from_secs(10)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let clock = clock();
        assert!(clock.set_speed(-1.0).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
    }

    #[test]
    fn test_out_of_range_advance_rejected_without_mutation() {
        let clock = clock();
        let before = clock.current_date().unwrap();
        let err = clock.advance(i64::MAX, TimeUnit::Days).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(clock.current_date().unwrap(), before);
    }

    #[test]
    fn test_concurrent_advances_are_monotonic_and_lossless() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(VirtualClock::open(store).unwrap());

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || {
                    let mut last = clock.current_date().unwrap();
                    for _ in 0..25 {
                        let now = clock.advance(1, TimeUnit::Hours).unwrap();
                        assert!(now > last);
                        last = now;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // no advance was lost to an overlapping writer
        assert_eq!(clock.current_date().unwrap(), default_epoch() + Duration::hours(100));
    }

    proptest::proptest! {
        #[test]
        fn prop_date_never_moves_backward(amounts in proptest::collection::vec(-48i64..=48, 1..40)) {
            let clock = clock();
            let mut last = clock.current_date().unwrap();
            for amount in amounts {
                let _ = clock.advance(amount, TimeUnit::Hours);
                let now = clock.current_date().unwrap();
                proptest::prop_assert!(now >= last);
                last = now;
            }
        }
    }
}
