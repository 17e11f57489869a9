//! Submission reconciliation
//!
//! For one tracked user: pull recent accepted submissions from the activity
//! source, resolve each slug against the problem catalog, and register every
//! resolved submission with the score ledger in source order.
//!
//! The reconciler keeps no record of what it has already seen. Unless the
//! ledger runs with [`DuplicatePolicy::Skip`](crate::storage::DuplicatePolicy),
//! running it twice over the same submissions credits them twice.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::User;
use crate::source::SubmissionSource;
use crate::storage::{Database, Registration, ScoreLedger};

/// Submissions requested per user per cycle
pub const DEFAULT_SUBMISSION_LIMIT: usize = 20;

/// Outcome of reconciling one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub handle: String,
    /// The source had no data; nothing else was attempted
    pub skipped: bool,
    pub fetched: usize,
    /// Submissions whose slug is not in the catalog
    pub unresolved: usize,
    pub credited: usize,
    pub duplicates: usize,
    /// Registrations that rolled back
    pub failed: usize,
}

impl ReconcileReport {
    fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            ..Default::default()
        }
    }
}

/// Reconciles external activity into the score ledger
pub struct Reconciler {
    db: Arc<Database>,
    source: Arc<dyn SubmissionSource>,
    ledger: Arc<ScoreLedger>,
    limit: usize,
}

impl Reconciler {
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn SubmissionSource>,
        ledger: Arc<ScoreLedger>,
    ) -> Self {
        Self {
            db,
            source,
            ledger,
            limit: DEFAULT_SUBMISSION_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Register the user's recent accepted submissions
    ///
    /// Registration failures are counted and skipped. A failure reading the
    /// catalog is returned to the caller.
    #[tracing::instrument(
        skip(self, user),
        fields(handle = %user.leetcode_username, user_id = user.id)
    )]
    pub async fn reconcile(&self, user: &User) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new(&user.leetcode_username);

        let Some(submissions) = self
            .source
            .recent_accepted_submissions(&user.leetcode_username, self.limit)
            .await
        else {
            tracing::debug!("No submission data, skipping user this cycle");
            report.skipped = true;
            return Ok(report);
        };
        report.fetched = submissions.len();

        for submission in &submissions {
            let Some(problem) = self.db.problem_by_slug(&submission.title_slug)? else {
                tracing::debug!(slug = %submission.title_slug, "Problem not in catalog, skipped");
                report.unresolved += 1;
                continue;
            };

            match self
                .ledger
                .register_submission(user.id, problem.id, submission.submission_id)
            {
                Ok(Registration::Credited(_)) => report.credited += 1,
                Ok(Registration::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    tracing::warn!(
                        submission_id = submission.submission_id,
                        slug = %submission.title_slug,
                        error = %e,
                        "Submission not credited"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            fetched = report.fetched,
            credited = report.credited,
            unresolved = report.unresolved,
            failed = report.failed,
            "User reconciled"
        );
        Ok(report)
    }
}
