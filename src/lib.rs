//! Reflex Timer - High-precision reaction-time measurement
//!
//! A monotonic start/stop timer with a strict two-state machine, a measurement
//! series that aggregates completed intervals into summary statistics, and a
//! session driver that wires stimulus and movement events to the timer.
//!
//! ## Modules
//!
//! - **Timer**: `HighPrecisionTimer` measuring elapsed milliseconds on a monotonic clock
//! - **Series**: `MeasurementSeries` collecting results and computing count/average/min/max
//! - **Session**: `SessionController` running reaction-time trials with response timeouts

pub mod clock;
pub mod config;
pub mod error;
pub mod series;
pub mod session;
pub mod timer;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, MonotonicClock, MonotonicTimestamp};
pub use config::SessionConfig;
pub use error::{ConfigError, TimerError};
pub use series::{MeasurementSeries, Statistics};
pub use session::{SessionController, SessionReport, TrialOutcome, TrialRecord};
pub use timer::{HighPrecisionTimer, TimerState};

/// Library version embedded in session reports
pub const REFLEX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "reflex-timer";
