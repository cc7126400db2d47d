//! Error types for dialwatch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DialwatchError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio source lost: {message}")]
    AudioSourceLost { message: String },

    // Modem errors
    #[error("Modem command {command} failed: expected {expected}, got {actual:?}")]
    ModemCommand {
        command: String,
        expected: String,
        actual: String,
    },

    #[error("Modem did not answer {command} within the timeout")]
    ModemTimeout { command: String },

    // Notification errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

/// Failure of a single notification attempt.
///
/// Every variant is recoverable: the delivery manager schedules another
/// attempt until the task's deadline passes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("destination answered with status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not encode payload: {0}")]
    Payload(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DialwatchError>;
