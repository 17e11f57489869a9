//! Error types for the scheduler module

use std::fmt;

use crate::error::{CrawlerErrorTrait, ErrorCategory};

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// `start()` while the loop is already running
    AlreadyRunning,

    /// `stop()` while the loop is not running
    NotRunning,

    /// Invalid interval or restart policy
    InvalidConfig { field: String, reason: String },

    /// The supervisor task could not be joined
    TaskJoin { reason: String },
}

impl SchedulerError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "Crawl scheduler is already running"),
            Self::NotRunning => write!(f, "Crawl scheduler is not running"),
            Self::InvalidConfig { field, reason } => {
                write!(f, "Scheduler config error in '{}': {}", field, reason)
            }
            Self::TaskJoin { reason } => write!(f, "Supervisor task failed: {}", reason),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin {
            reason: err.to_string(),
        }
    }
}

impl CrawlerErrorTrait for SchedulerError {
    fn is_recoverable(&self) -> bool {
        // Lifecycle misuse is reported back to the operator, the loop itself is fine
        matches!(self, Self::AlreadyRunning | Self::NotRunning)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } => ErrorCategory::Config,
            _ => ErrorCategory::Scheduler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::invalid_config("interval", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Scheduler config error in 'interval': must be greater than 0"
        );
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());

        assert!(SchedulerError::NotRunning.is_recoverable());
    }
}
