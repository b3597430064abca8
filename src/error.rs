//! Unified error handling for the stepdist library.
//!
//! Every fallible engine operation returns [`StepDistError`]. Configuration
//! problems are reported synchronously from `start`; nothing falls back to
//! defaults silently.

use std::fmt;

/// Unified error type for stepdist operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDistError {
    /// A start configuration parameter is missing or out of range
    Config { field: String, message: String },
    /// An input value (body height, sample, fix) cannot be used
    InvalidInput { message: String },
    /// The operation requires a running measurement session
    NotRunning { operation: String },
    /// Persistence/storage error
    Persistence { message: String },
    /// The session worker has shut down
    SessionClosed,
}

impl fmt::Display for StepDistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepDistError::Config { field, message } => {
                write!(f, "Configuration error in '{}': {}", field, message)
            }
            StepDistError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            StepDistError::NotRunning { operation } => {
                write!(f, "'{}' requires a running session", operation)
            }
            StepDistError::Persistence { message } => {
                write!(f, "Persistence error: {}", message)
            }
            StepDistError::SessionClosed => write!(f, "Session worker has shut down"),
        }
    }
}

impl std::error::Error for StepDistError {}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for StepDistError {
    fn from(err: rusqlite::Error) -> Self {
        StepDistError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StepDistError {
    fn from(err: serde_json::Error) -> Self {
        StepDistError::Config {
            field: "<json>".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for stepdist operations.
pub type Result<T> = std::result::Result<T, StepDistError>;

/// Build a configuration error for `field`.
pub(crate) fn config_error(field: &str, message: impl Into<String>) -> StepDistError {
    StepDistError::Config {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Extension trait for converting Option to StepDistError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a not-running error.
    fn ok_or_not_running(self, operation: &str) -> Result<T>;

    /// Convert Option to Result with an invalid input error.
    fn ok_or_invalid(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_running(self, operation: &str) -> Result<T> {
        self.ok_or_else(|| StepDistError::NotRunning {
            operation: operation.to_string(),
        })
    }

    fn ok_or_invalid(self, message: &str) -> Result<T> {
        self.ok_or_else(|| StepDistError::InvalidInput {
            message: message.to_string(),
        })
    }
}
