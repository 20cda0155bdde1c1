//! Time sources for elapsed-time accounting.
//!
//! Elapsed time is always derived from anchors (`running_since`) and the
//! current reading of a [`Clock`]; nothing in the engine counts ticks.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Wall-clock source with at-least-second resolution that never runs backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Whole seconds between two instants, never negative.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

/// System wall clock, clamped so a backwards NTP step or resume-from-sleep
/// adjustment is never observed as time going back.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let current = Utc::now();
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let reading = match *last {
            Some(previous) if previous > current => previous,
            _ => current,
        };
        *last = Some(reading);
        reading
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Clock positioned at the unix epoch, convenient for "t = N" scenarios.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    pub fn advance(&self, seconds: u64) {
        let mut now = self.lock();
        *now += Duration::seconds(seconds as i64);
    }

    /// Moves the clock to `instant`; earlier instants are ignored.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.lock();
        if instant > *now {
            *now = instant;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
