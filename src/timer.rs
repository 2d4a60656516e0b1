//! High-precision interval timer
//!
//! `HighPrecisionTimer` brackets one measurement at a time with `start()` and
//! `stop()`. The state machine has two states and every other transition is a
//! hard error: a second `start()` never resets an in-progress measurement and a
//! stray `stop()` never fabricates a value.

use crate::clock::{duration_to_ms, Clock, MonotonicClock, MonotonicTimestamp};
use crate::error::TimerError;

/// Timer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running { started_at: MonotonicTimestamp },
}

/// Monotonic start/stop timer reporting elapsed milliseconds as `f64`.
///
/// A single instance is meant to be reused across many measurement cycles.
/// No internal locking is performed; share it across threads only behind
/// the caller's own synchronization.
#[derive(Debug)]
pub struct HighPrecisionTimer<C: Clock = MonotonicClock> {
    clock: C,
    state: TimerState,
}

impl Default for HighPrecisionTimer<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl HighPrecisionTimer<MonotonicClock> {
    /// Create an idle timer on the platform monotonic clock
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl<C: Clock> HighPrecisionTimer<C> {
    /// Create an idle timer reading time from `clock`
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: TimerState::Idle,
        }
    }

    /// Begin a measurement.
    ///
    /// Fails with [`TimerError::AlreadyRunning`] if a measurement is in
    /// progress; the original start instant is left untouched.
    pub fn start(&mut self) -> Result<(), TimerError> {
        if self.is_running() {
            return Err(TimerError::AlreadyRunning);
        }
        self.state = TimerState::Running {
            started_at: self.clock.now(),
        };
        Ok(())
    }

    /// End the measurement and return the elapsed time in milliseconds.
    ///
    /// Fails with [`TimerError::NotRunning`] when idle, whether the timer was
    /// never started or has already been stopped.
    pub fn stop(&mut self) -> Result<f64, TimerError> {
        let elapsed = self.elapsed_ms()?;
        self.state = TimerState::Idle;
        Ok(elapsed)
    }

    /// Milliseconds elapsed so far in the running measurement, without
    /// stopping it.
    pub fn elapsed_ms(&self) -> Result<f64, TimerError> {
        match self.state {
            TimerState::Running { started_at } => {
                let now = self.clock.now();
                Ok(duration_to_ms(now.saturating_duration_since(started_at)))
            }
            TimerState::Idle => Err(TimerError::NotRunning),
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    /// The clock this timer reads from
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;
    use std::thread;
    use std::time::Duration;

    fn manual_timer() -> (HighPrecisionTimer<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (HighPrecisionTimer::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_new_timer_is_idle() {
        let timer = HighPrecisionTimer::new();
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_start_stop_reports_fractional_ms() {
        let (mut timer, clock) = manual_timer();

        timer.start().unwrap();
        assert!(timer.is_running());
        clock.advance(Duration::from_micros(12_345));

        let elapsed = timer.stop().unwrap();
        assert!((elapsed - 12.345).abs() < 1e-5);
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn test_double_start_preserves_original_instant() {
        let (mut timer, clock) = manual_timer();

        timer.start().unwrap();
        clock.advance_ms(40.0);
        assert_eq!(timer.start(), Err(TimerError::AlreadyRunning));
        clock.advance_ms(60.0);

        let elapsed = timer.stop().unwrap();
        assert!((elapsed - 100.0).abs() < 1e-5);
    }

    #[test]
    fn test_stop_without_start_fails() {
        let (mut timer, _clock) = manual_timer();
        assert_eq!(timer.stop(), Err(TimerError::NotRunning));
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn test_double_stop_fails() {
        let (mut timer, clock) = manual_timer();

        timer.start().unwrap();
        clock.advance_ms(10.0);
        timer.stop().unwrap();

        assert_eq!(timer.stop(), Err(TimerError::NotRunning));
    }

    #[test]
    fn test_elapsed_peek_does_not_stop() {
        let (mut timer, clock) = manual_timer();
        assert_eq!(timer.elapsed_ms(), Err(TimerError::NotRunning));

        timer.start().unwrap();
        clock.advance_ms(25.0);
        assert!((timer.elapsed_ms().unwrap() - 25.0).abs() < 1e-5);
        assert!(timer.is_running());

        clock.advance_ms(25.0);
        assert!((timer.stop().unwrap() - 50.0).abs() < 1e-5);
    }

    #[test]
    fn test_timer_reused_across_cycles() {
        let (mut timer, clock) = manual_timer();

        for i in 1..=5 {
            timer.start().unwrap();
            clock.advance_ms(i as f64 * 10.0);
            let elapsed = timer.stop().unwrap();
            assert!((elapsed - i as f64 * 10.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_length_measurement_is_non_negative() {
        let mut timer = HighPrecisionTimer::new();
        timer.start().unwrap();
        let elapsed = timer.stop().unwrap();
        assert!(elapsed >= 0.0);
    }

    #[test]
    fn test_real_clock_100ms_sleep() {
        let mut timer = HighPrecisionTimer::new();

        timer.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        let elapsed = timer.stop().unwrap();

        assert!(
            (90.0..=110.0).contains(&elapsed),
            "Expected ~100ms, got {elapsed}ms"
        );
    }

    #[test]
    fn test_real_clock_1000ms_sleep() {
        let mut timer = HighPrecisionTimer::new();

        timer.start().unwrap();
        thread::sleep(Duration::from_millis(1000));
        let elapsed = timer.stop().unwrap();

        assert!(
            (elapsed - 1000.0).abs() <= 50.0,
            "Expected ~1000ms, got {elapsed}ms"
        );
    }
}
