//! Reaction-time session driver
//!
//! `SessionController` sits between the event sources (a stimulus presenter
//! and a movement detector) and the measurement series. It keeps the
//! "waiting for response" flag alongside the timer so movement signals are
//! ignored when no trial is open, enforces the response window, and turns
//! timer misuse into skipped trials instead of aborting the session.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, MonotonicClock};
use crate::config::SessionConfig;
use crate::error::ConfigError;
use crate::series::{MeasurementSeries, Statistics};
use crate::timer::HighPrecisionTimer;
use crate::{PRODUCER_NAME, REFLEX_VERSION};

/// How a single trial ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Movement detected inside the response window
    Responded { reaction_ms: f64 },
    /// No movement before the response timeout
    TimedOut { waited_ms: f64 },
    /// The timer rejected the transition; nothing was recorded
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based trial number
    pub trial: usize,
    #[serde(flatten)]
    pub outcome: TrialOutcome,
}

/// End-of-session summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub producer: String,
    pub version: String,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: SessionConfig,
    pub trials: Vec<TrialRecord>,
    pub responded: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub statistics: Statistics,
}

impl SessionReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Wires stimulus and movement events to a measurement series
pub struct SessionController<C: Clock = MonotonicClock> {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    config: SessionConfig,
    series: MeasurementSeries<C>,
    waiting_for_response: bool,
    trials: Vec<TrialRecord>,
}

impl SessionController<MonotonicClock> {
    /// Create a controller on the platform monotonic clock.
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> SessionController<C> {
    pub fn with_clock(config: SessionConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            series: MeasurementSeries::with_timer(HighPrecisionTimer::with_clock(clock)),
            waiting_for_response: false,
            trials: Vec::new(),
        })
    }

    /// A stimulus was shown. Returns `true` if a measurement was opened.
    ///
    /// If a trial is already open the request is skipped and the open
    /// measurement keeps running from its original onset.
    pub fn stimulus_presented(&mut self) -> bool {
        match self.series.start_measurement() {
            Ok(()) => {
                self.waiting_for_response = true;
                debug!(
                    "session {}: trial {} stimulus presented",
                    self.session_id,
                    self.trials.len() + 1
                );
                true
            }
            Err(e) => {
                warn!("session {}: ignoring stimulus: {}", self.session_id, e);
                self.record(TrialOutcome::Skipped {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Movement was detected. Ignored unless a response is awaited.
    pub fn movement_detected(&mut self) -> Option<TrialOutcome> {
        if !self.waiting_for_response {
            return None;
        }
        self.waiting_for_response = false;

        let outcome = match self.series.stop_measurement() {
            Ok(reaction_ms) => {
                debug!(
                    "session {}: reaction time {:.3} ms",
                    self.session_id, reaction_ms
                );
                TrialOutcome::Responded { reaction_ms }
            }
            Err(e) => {
                warn!("session {}: dropping response: {}", self.session_id, e);
                TrialOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        Some(self.record(outcome))
    }

    /// Close the open trial if its response window has expired.
    pub fn poll_timeout(&mut self) -> Option<TrialOutcome> {
        if !self.waiting_for_response {
            return None;
        }
        let elapsed = self.series.timer().elapsed_ms().ok()?;
        if elapsed < self.config.response_timeout_ms {
            return None;
        }
        self.waiting_for_response = false;

        let outcome = match self.series.abandon_measurement() {
            Ok(waited_ms) => {
                debug!(
                    "session {}: no response after {:.1} ms",
                    self.session_id, waited_ms
                );
                TrialOutcome::TimedOut { waited_ms }
            }
            Err(e) => TrialOutcome::Skipped {
                reason: e.to_string(),
            },
        };
        Some(self.record(outcome))
    }

    /// Milliseconds left in the open response window, or `None` when no
    /// response is awaited.
    pub fn remaining_response_ms(&self) -> Option<f64> {
        if !self.waiting_for_response {
            return None;
        }
        let elapsed = self.series.timer().elapsed_ms().ok()?;
        Some((self.config.response_timeout_ms - elapsed).max(0.0))
    }

    fn record(&mut self, outcome: TrialOutcome) -> TrialOutcome {
        self.trials.push(TrialRecord {
            trial: self.trials.len() + 1,
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn is_waiting_for_response(&self) -> bool {
        self.waiting_for_response
    }

    /// True once the configured number of trials has been closed
    pub fn is_complete(&self) -> bool {
        self.trials.len() >= self.config.trials
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn series(&self) -> &MeasurementSeries<C> {
        &self.series
    }

    pub fn statistics(&self) -> Statistics {
        self.series.statistics()
    }

    /// Summarize the session so far
    pub fn report(&self) -> SessionReport {
        let count = |pred: fn(&TrialOutcome) -> bool| {
            self.trials.iter().filter(|t| pred(&t.outcome)).count()
        };

        SessionReport {
            producer: PRODUCER_NAME.to_string(),
            version: REFLEX_VERSION.to_string(),
            session_id: self.session_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            config: self.config.clone(),
            trials: self.trials.clone(),
            responded: count(|o| matches!(o, TrialOutcome::Responded { .. })),
            timed_out: count(|o| matches!(o, TrialOutcome::TimedOut { .. })),
            skipped: count(|o| matches!(o, TrialOutcome::Skipped { .. })),
            statistics: self.series.statistics(),
        }
    }
}
