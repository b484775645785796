//! ABOUTME: Error taxonomy for provisio's workflow engine
//! ABOUTME: Provides ProvisioError and the crate-wide Result alias

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Comprehensive error enum for workflow engine operations.
///
/// `RollbackIncomplete` and `DisposalLeak` from the design's error taxonomy
/// are intentionally absent here: both are best-effort failures that are
/// logged but never surfaced as a typed error crossing an API boundary.
#[derive(Debug, Error)]
pub enum ProvisioError {
    #[error("validation failed for step '{step}': {message}")]
    ValidationFailed { step: String, message: String },

    #[error("execution failed for step '{step}': {message}")]
    ExecutionFailed {
        step: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{message} (timed out after {elapsed:?})")]
    Timeout { message: String, elapsed: Duration },

    #[error("workflow cancelled")]
    Cancelled,

    #[error("administrator privileges required")]
    PrivilegeDenied,

    #[error("caller error: {0}")]
    CallerError(String),
}

impl ProvisioError {
    #[must_use]
    pub fn validation(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            step: step.into(),
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn execution_with_source(
        step: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ExecutionFailed {
            step: step.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub const fn timeout(message: String, elapsed: Duration) -> Self {
        Self::Timeout { message, elapsed }
    }

    /// Short, stable kind name for logging and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::PrivilegeDenied => "privilege_denied",
            Self::CallerError(_) => "caller_error",
        }
    }
}

impl From<std::io::Error> for ProvisioError {
    fn from(err: std::io::Error) -> Self {
        Self::ExecutionFailed {
            step: String::new(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ProvisioError>;

/// Log level understood by a [`crate::sink::LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_formats_step_and_message() {
        let err = ProvisioError::validation("copy-file", "source missing");
        assert_eq!(
            err.to_string(),
            "validation failed for step 'copy-file': source missing"
        );
        assert_eq!(err.kind(), "validation_failed");
    }

    #[test]
    fn execution_error_carries_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err = ProvisioError::execution_with_source("copy-file", "copy failed", io_err);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_error_converts_into_execution_failed() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ProvisioError = io_err.into();
        assert!(matches!(err, ProvisioError::ExecutionFailed { .. }));
    }

    #[test]
    fn log_level_orders_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }
}
