//! Measurement series and summary statistics
//!
//! `MeasurementSeries` owns a timer, appends one entry per successful stop and
//! summarizes the full history on demand. Failed operations leave the history
//! untouched.

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, MonotonicClock};
use crate::error::TimerError;
use crate::timer::HighPrecisionTimer;

/// Summary of a measurement history.
///
/// Extrema and mean are `None` for an empty history (serialized as `null`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Statistics {
    /// Compute statistics over `values`
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                average: None,
                min: None,
                max: None,
            };
        }

        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count: values.len(),
            average: Some(sum / values.len() as f64),
            min: Some(min),
            max: Some(max),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Accumulates elapsed-time results from a reused timer.
#[derive(Debug)]
pub struct MeasurementSeries<C: Clock = MonotonicClock> {
    timer: HighPrecisionTimer<C>,
    history: Vec<f64>,
    latest: Option<f64>,
}

impl Default for MeasurementSeries<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSeries<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_timer(HighPrecisionTimer::new())
    }
}

impl<C: Clock> MeasurementSeries<C> {
    /// Create an empty series driving `timer`
    pub fn with_timer(timer: HighPrecisionTimer<C>) -> Self {
        Self {
            timer,
            history: Vec::new(),
            latest: None,
        }
    }

    pub fn start_measurement(&mut self) -> Result<(), TimerError> {
        self.timer.start()
    }

    /// Stop the running measurement and record it
    pub fn stop_measurement(&mut self) -> Result<f64, TimerError> {
        let elapsed = self.timer.stop()?;
        self.history.push(elapsed);
        self.latest = Some(elapsed);
        Ok(elapsed)
    }

    /// Stop the running measurement without recording it.
    ///
    /// Returns the discarded elapsed time. Used when a trial ends without a
    /// valid response (e.g. a response timeout).
    pub fn abandon_measurement(&mut self) -> Result<f64, TimerError> {
        self.timer.stop()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_values(&self.history)
    }

    /// Most recently recorded measurement
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    /// All recorded measurements in insertion order
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn is_measuring(&self) -> bool {
        self.timer.is_running()
    }

    pub fn timer(&self) -> &HighPrecisionTimer<C> {
        &self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;
    use std::thread;
    use std::time::Duration;

    fn manual_series() -> (MeasurementSeries<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let series = MeasurementSeries::with_timer(HighPrecisionTimer::with_clock(clock.clone()));
        (series, clock)
    }

    fn record(series: &mut MeasurementSeries<ManualClock>, clock: &ManualClock, ms: f64) -> f64 {
        series.start_measurement().unwrap();
        clock.advance_ms(ms);
        series.stop_measurement().unwrap()
    }

    #[test]
    fn test_empty_statistics_are_absent() {
        let (series, _clock) = manual_series();
        let stats = series.statistics();

        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(series.latest(), None);
    }

    #[test]
    fn test_statistics_over_known_values() {
        let (mut series, clock) = manual_series();
        for ms in [250.0, 180.0, 320.0, 210.0] {
            record(&mut series, &clock, ms);
        }

        let stats = series.statistics();
        assert_eq!(stats.count, 4);
        assert!((stats.average.unwrap() - 240.0).abs() < 1e-6);
        assert!((stats.min.unwrap() - 180.0).abs() < 1e-6);
        assert!((stats.max.unwrap() - 320.0).abs() < 1e-6);
        assert!((series.latest().unwrap() - 210.0).abs() < 1e-6);
    }

    #[test]
    fn test_history_preserves_insertion_order() {
        let (mut series, clock) = manual_series();
        for ms in [3.0, 1.0, 2.0] {
            record(&mut series, &clock, ms);
        }

        let history: Vec<f64> = series.history().iter().map(|v| v.round()).collect();
        assert_eq!(history, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_statistics_idempotent() {
        let (mut series, clock) = manual_series();
        record(&mut series, &clock, 120.0);
        record(&mut series, &clock, 80.0);

        let first = series.statistics();
        let second = series.statistics();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stop_without_start_leaves_history_unchanged() {
        let (mut series, clock) = manual_series();
        record(&mut series, &clock, 50.0);

        assert_eq!(series.stop_measurement(), Err(TimerError::NotRunning));
        assert_eq!(series.len(), 1);
        assert!((series.latest().unwrap() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_double_start_propagates_and_keeps_first_instant() {
        let (mut series, clock) = manual_series();

        series.start_measurement().unwrap();
        clock.advance_ms(30.0);
        assert_eq!(series.start_measurement(), Err(TimerError::AlreadyRunning));
        clock.advance_ms(30.0);

        let elapsed = series.stop_measurement().unwrap();
        assert!((elapsed - 60.0).abs() < 1e-6);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_abandon_does_not_record() {
        let (mut series, clock) = manual_series();

        series.start_measurement().unwrap();
        clock.advance_ms(2_000.0);
        let discarded = series.abandon_measurement().unwrap();

        assert!((discarded - 2_000.0).abs() < 1e-6);
        assert!(series.is_empty());
        assert!(!series.is_measuring());
        assert_eq!(series.abandon_measurement(), Err(TimerError::NotRunning));
    }

    #[test]
    fn test_history_len_matches_successful_stops() {
        let (mut series, clock) = manual_series();
        let mut stops = 0;

        for i in 0..10 {
            if i % 3 != 0 {
                series.start_measurement().unwrap();
                clock.advance_ms(1.0);
            }
            if series.stop_measurement().is_ok() {
                stops += 1;
            }
        }

        assert_eq!(series.len(), stops);
    }

    #[test]
    fn test_statistics_json_encodes_absent_as_null() {
        let json = Statistics::from_values(&[]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["count"], 0);
        assert!(value["average"].is_null());
        assert!(value["min"].is_null());
        assert!(value["max"].is_null());
    }

    #[test]
    fn test_end_to_end_real_clock() {
        let mut series = MeasurementSeries::new();

        series.start_measurement().unwrap();
        thread::sleep(Duration::from_millis(100));
        let first = series.stop_measurement().unwrap();
        assert!((90.0..=110.0).contains(&first), "Expected ~100ms, got {first}ms");

        series.start_measurement().unwrap();
        thread::sleep(Duration::from_millis(50));
        let second = series.stop_measurement().unwrap();
        assert!((40.0..=60.0).contains(&second), "Expected ~50ms, got {second}ms");

        let stats = series.statistics();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Some(second));
        assert_eq!(stats.max, Some(first));
        assert!((stats.average.unwrap() - (first + second) / 2.0).abs() < 1e-9);
    }
}
