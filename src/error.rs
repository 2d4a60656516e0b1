//! Error types for Reflex Timer

use thiserror::Error;

/// Misuse of the timer's start/stop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("Timer is already running")]
    AlreadyRunning,

    #[error("Timer is not running")]
    NotRunning,
}

/// Errors raised while loading or validating a session configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid session configuration: {0}")]
    Invalid(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
