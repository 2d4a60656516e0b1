//! Monotonic clock sources
//!
//! Interval measurement must never be affected by wall-clock adjustments, so
//! the timer reads time exclusively through the [`Clock`] trait. The default
//! source wraps `std::time::Instant`; [`ManualClock`] lets tests step time
//! deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Opaque point on a monotonic timeline.
///
/// Only differences between two timestamps taken from the same clock are
/// meaningful. Values are non-decreasing and carry nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimestamp(Duration);

impl MonotonicTimestamp {
    /// Duration elapsed from `earlier` to `self`, saturating at zero.
    pub fn saturating_duration_since(&self, earlier: MonotonicTimestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// A monotonic, high-resolution time source.
pub trait Clock {
    fn now(&self) -> MonotonicTimestamp;
}

/// Clock backed by the platform monotonic clock (`std::time::Instant`).
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> MonotonicTimestamp {
        MonotonicTimestamp(self.origin.elapsed())
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same timeline, so a test can hand one clone to a timer
/// and keep another to move time forward. Time only moves when `advance` is
/// called, so this is never a substitute for [`MonotonicClock`] in real
/// measurements. Built on `Rc`, hence `!Send`: keep it on one thread.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        self.now.set(self.now.get() + step);
    }

    /// Move the clock forward by a fractional number of milliseconds.
    pub fn advance_ms(&self, ms: f64) {
        self.advance(Duration::from_secs_f64(ms.max(0.0) / 1000.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> MonotonicTimestamp {
        MonotonicTimestamp(self.now.get())
    }
}

/// Convert a duration into fractional milliseconds without truncation.
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
