//! Session configuration
//!
//! Controls stimulus pacing and response windows for a reaction-time
//! session. Loadable from JSON; missing fields take their defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default lower bound of the random pre-stimulus delay (seconds)
pub const DEFAULT_MIN_DELAY_SECS: f64 = 2.0;

/// Default upper bound of the random pre-stimulus delay (seconds)
pub const DEFAULT_MAX_DELAY_SECS: f64 = 4.0;

/// Default time a stimulus stays up waiting for a response (milliseconds)
pub const DEFAULT_RESPONSE_TIMEOUT_MS: f64 = 2000.0;

/// Default number of trials per session
pub const DEFAULT_TRIALS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Shortest wait before a stimulus is presented (seconds)
    pub min_delay_secs: f64,
    /// Longest wait before a stimulus is presented (seconds)
    pub max_delay_secs: f64,
    /// Response window after stimulus onset (milliseconds)
    pub response_timeout_ms: f64,
    /// Number of trials to run
    pub trials: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            trials: DEFAULT_TRIALS,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_delay_secs.is_finite() || self.min_delay_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_delay_secs must be a non-negative number, got {}",
                self.min_delay_secs
            )));
        }
        if !self.max_delay_secs.is_finite() || self.max_delay_secs < self.min_delay_secs {
            return Err(ConfigError::Invalid(format!(
                "max_delay_secs ({}) must not be less than min_delay_secs ({})",
                self.max_delay_secs, self.min_delay_secs
            )));
        }
        if !self.response_timeout_ms.is_finite() || self.response_timeout_ms <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "response_timeout_ms must be positive, got {}",
                self.response_timeout_ms
            )));
        }
        if self.trials == 0 {
            return Err(ConfigError::Invalid("trials must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Draw a pre-stimulus delay uniformly from `[min_delay_secs, max_delay_secs]`.
    ///
    /// Fails instead of panicking when the bounds do not validate or the
    /// drawn delay does not fit in a `Duration`.
    pub fn sample_stimulus_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Duration, ConfigError> {
        self.validate()?;
        let secs = if self.max_delay_secs > self.min_delay_secs {
            rng.gen_range(self.min_delay_secs..=self.max_delay_secs)
        } else {
            self.min_delay_secs
        };
        Duration::try_from_secs_f64(secs)
            .map_err(|e| ConfigError::Invalid(format!("stimulus delay {secs}s out of range: {e}")))
    }
}
