//! External activity sources
//!
//! A [`SubmissionSource`] answers one question: which accepted submissions
//! did this handle make recently? Sources are unreliable by nature, so the
//! trait returns `None` instead of an error when no data is available; the
//! reconciler simply skips the user for this cycle.
//!
//! - [`LeetCodeClient`] - GraphQL client for the production judge
//! - [`StaticSource`] - canned answers for tests and dry runs

mod leetcode;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{CrawlerErrorTrait, ErrorCategory};
use crate::models::RecentSubmission;

pub use leetcode::{LeetCodeClient, DEFAULT_ENDPOINT};

/// Errors raised while talking to an activity source
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Source answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Response body did not have the expected shape
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl CrawlerErrorTrait for SourceError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status(status) => *status == 429 || *status >= 500,
            Self::InvalidPayload(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

/// Provider of recent accepted submissions
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Up to `limit` most recent accepted submissions for `handle`, newest first
    ///
    /// `None` means the source had nothing to say this time (unknown handle,
    /// transport failure, rate limiting).
    async fn recent_accepted_submissions(
        &self,
        handle: &str,
        limit: usize,
    ) -> Option<Vec<RecentSubmission>>;
}

/// In-memory source with fixed answers per handle
#[derive(Debug, Default)]
pub struct StaticSource {
    answers: Mutex<HashMap<String, Vec<RecentSubmission>>>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `submissions` for `handle` from now on
    pub fn set(&self, handle: impl Into<String>, submissions: Vec<RecentSubmission>) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(handle.into(), submissions);
        }
    }

    /// Answer `None` for `handle` from now on
    pub fn remove(&self, handle: &str) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.remove(handle);
        }
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SubmissionSource for StaticSource {
    async fn recent_accepted_submissions(
        &self,
        handle: &str,
        limit: usize,
    ) -> Option<Vec<RecentSubmission>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let answers = self.answers.lock().ok()?;
        answers
            .get(handle)
            .map(|subs| subs.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_answers() {
        let source = StaticSource::new();
        source.set(
            "alice",
            vec![
                RecentSubmission::new(3, "two-sum"),
                RecentSubmission::new(2, "three-sum"),
                RecentSubmission::new(1, "four-sum"),
            ],
        );

        let subs = source.recent_accepted_submissions("alice", 2).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].submission_id, 3);

        assert!(source.recent_accepted_submissions("bob", 20).await.is_none());

        source.remove("alice");
        assert!(source.recent_accepted_submissions("alice", 20).await.is_none());
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn test_source_error_recoverability() {
        assert!(SourceError::Status(429).is_recoverable());
        assert!(SourceError::Status(503).is_recoverable());
        assert!(!SourceError::Status(404).is_recoverable());
        assert!(!SourceError::InvalidPayload("missing data".into()).is_recoverable());
    }
}
