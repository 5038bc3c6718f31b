//! Time source.
//!
//! Gameplay code never reads the wall clock directly; it takes a `Millis`
//! value from whoever drives the frame. Binaries use `SystemClock`, tests use
//! `ManualClock`.

use std::cell::Cell;

/// Milliseconds since an arbitrary epoch.
pub type Millis = u64;

/// Source of the current time in milliseconds.
pub trait Clock {
    fn now_millis(&self) -> Millis;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        chrono::Utc::now().timestamp_millis().max(0) as Millis
    }
}

/// Manually advanced clock for tests and deterministic replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: Millis) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(16);
        assert_eq!(clock.now_millis(), 1_016);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn system_clock_is_past_epoch() {
        assert!(SystemClock.now_millis() > 1_600_000_000_000);
    }
}
