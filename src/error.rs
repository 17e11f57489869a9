//! Unified error handling for the llc-crawler crate
//!
//! Each domain keeps its own error enum (storage, ledger, activity source,
//! scheduler). This module folds the ones that cross module boundaries into a
//! single [`Error`] so that the reconciler and the crawl job can use `?` while
//! the scheduler still gets enough information to decide how to react.
//! Activity source failures stay inside [`crate::source`]: a source answers
//! `None` and the user is skipped for the cycle.
//!
//! # Architecture
//!
//! - [`CrawlerErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use llc_crawler::error::{CrawlerErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = %err.category(), "retrying next tick: {err}");
//!     } else {
//!         tracing::error!("fatal: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::SchedulerError;
pub use crate::source::SourceError;
pub use crate::storage::ledger::LedgerError;
pub use crate::storage::StorageError;

/// Common trait for all crate error types
///
/// Gives the scheduler and the CLI one way to classify failures regardless
/// of which layer produced them.
pub trait CrawlerErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the next tick may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Activity source errors (HTTP, timeout, malformed payload)
    Network,
    /// Relational store errors
    Storage,
    /// Score ledger rule violations (e.g. no daily object)
    Ledger,
    /// Configuration and validation errors
    Config,
    /// Scheduler lifecycle errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Ledger => "ledger",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the crate
///
/// Returned by [`crate::scheduler::CrawlJob::run_tick`] and the reconciler.
/// Ledger failures are soft and stay as [`LedgerError`] inside the
/// reconciler; scheduler lifecycle calls return [`SchedulerError`] directly.
#[derive(Error, Debug)]
pub enum Error {
    /// Relational store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Failure raised by a [`crate::scheduler::CrawlJob`] implementation
    #[error("{0}")]
    Other(String),
}

impl CrawlerErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_recoverable(),
            Self::Config(_) => false,
            Self::Other(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other(_) => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic job failure
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other(context.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
