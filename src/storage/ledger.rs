//! Score ledger
//!
//! Crediting a submission touches four rows: a new `user_solved_problem` row,
//! today's `user_daily_object` row, and the current month's
//! `user_monthly_object` row (the two aggregates are created on first touch),
//! after resolving today's `daily_object`. All of it happens in one
//! transaction; a failure anywhere leaves no trace of the credit.
//!
//! Every commit attempt is reported to the database's notification sink,
//! including a duplicate that commits without writing anything. Callers
//! treat a failed registration as a soft failure and move on to the next
//! submission.
//!
//! # Policies
//!
//! Two behaviors are deliberately configurable rather than fixed:
//!
//! - [`DailyCreditPolicy`]: whether any solve credits today's daily bucket, or
//!   only a solve of today's designated problem.
//! - [`DuplicatePolicy`]: whether a `(user, submission)` pair that was already
//!   credited is credited again.
//!
//! Both default to the historical behavior (always credit the daily bucket,
//! never check for duplicates).

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{params, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::allocator::{next_id, Table};
use super::catalog::{daily_object_on, daily_score_row, monthly_score_row};
use super::{Database, StorageError};
use crate::error::{CrawlerErrorTrait, ErrorCategory};
use crate::utils::{first_day_of_month, Clock};

/// Points credited per registered submission
pub const SCORE_PER_SUBMISSION: i64 = 2;

/// Detail attached to the report of a skipped duplicate
const DUPLICATE_DETAIL: &str = "already credited, nothing written";

/// Errors raised while registering a submission
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No daily object was generated for the date being credited
    #[error("no daily object for {date}")]
    NoDailyObject { date: NaiveDate },

    /// Store failure (constraint violation, I/O, lock)
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

impl CrawlerErrorTrait for LedgerError {
    fn is_recoverable(&self) -> bool {
        match self {
            // The daily setup job may still create it before the next tick
            Self::NoDailyObject { .. } => true,
            Self::Storage(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NoDailyObject { .. } => ErrorCategory::Ledger,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which solves credit today's daily bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyCreditPolicy {
    /// Every registered submission credits today's bucket
    #[default]
    Always,
    /// Only a submission for today's designated problem credits it
    DesignatedOnly,
}

/// What to do with a submission that was already credited to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Credit it again; the ledger keeps no record of seen submissions
    #[default]
    Allow,
    /// Leave the ledger untouched and return [`Registration::Duplicate`]
    Skip,
}

/// Ledger configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    #[serde(default)]
    pub daily_credit: DailyCreditPolicy,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
}

/// Rows written for one credited submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditReceipt {
    pub solved_problem_id: i64,
    pub daily_object_id: i64,
    /// Today's score after the credit, `None` when the daily bucket was not touched
    pub daily_score: Option<i64>,
    /// This month's score after the credit
    pub monthly_score: i64,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Credited(CreditReceipt),
    Duplicate,
}

impl Registration {
    pub fn is_credited(&self) -> bool {
        matches!(self, Self::Credited(_))
    }
}

/// Applies submission credits to the score aggregates
pub struct ScoreLedger {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    policy: LedgerPolicy,
}

impl ScoreLedger {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            policy: LedgerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Credit `submission_id` on `problem_id` to `user_id`
    ///
    /// Writes the solved-problem row and the daily and monthly score updates
    /// in one transaction, then reports the commit attempt. Returns the error
    /// after reporting it; nothing is persisted in that case.
    pub fn register_submission(
        &self,
        user_id: i64,
        problem_id: i64,
        submission_id: i64,
    ) -> LedgerResult<Registration> {
        let today = self.clock.today();
        let context = format!(
            "UserSolvedProblem<user_id={user_id}, problem_id={problem_id}>, \
             Score<score_earned={SCORE_PER_SUBMISSION}, submission_id={submission_id}>"
        );

        let result = self
            .db
            .write(|tx| self.apply(tx, today, user_id, problem_id, submission_id));

        match &result {
            Ok(Registration::Credited(receipt)) => {
                tracing::debug!(
                    user_id,
                    problem_id,
                    submission_id,
                    monthly_score = receipt.monthly_score,
                    "Submission credited"
                );
                self.db.report_commit(&context, &result);
            }
            Ok(Registration::Duplicate) => {
                tracing::debug!(user_id, submission_id, "Submission already credited, skipped");
                self.db.notifier().report(true, &context, DUPLICATE_DETAIL);
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    problem_id,
                    submission_id,
                    error = %e,
                    "Submission registration rolled back"
                );
                self.db.report_commit(&context, &result);
            }
        }

        result
    }

    fn apply(
        &self,
        tx: &Transaction<'_>,
        today: NaiveDate,
        user_id: i64,
        problem_id: i64,
        submission_id: i64,
    ) -> LedgerResult<Registration> {
        if self.policy.duplicates == DuplicatePolicy::Skip
            && already_credited(tx, user_id, submission_id)?
        {
            return Ok(Registration::Duplicate);
        }

        let solved_problem_id = next_id(tx, Table::SolvedProblem)?;
        tx.execute(
            "INSERT INTO user_solved_problem (id, user_id, problem_id, submission_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![solved_problem_id, user_id, problem_id, submission_id],
        )?;

        let daily =
            daily_object_on(tx, today)?.ok_or(LedgerError::NoDailyObject { date: today })?;

        let credits_daily = match self.policy.daily_credit {
            DailyCreditPolicy::Always => true,
            DailyCreditPolicy::DesignatedOnly => daily.problem_id == problem_id,
        };
        let daily_score = if credits_daily {
            Some(credit_daily(tx, user_id, daily.id, SCORE_PER_SUBMISSION)?)
        } else {
            None
        };

        let monthly_score =
            credit_monthly(tx, user_id, first_day_of_month(today), SCORE_PER_SUBMISSION)?;

        Ok(Registration::Credited(CreditReceipt {
            solved_problem_id,
            daily_object_id: daily.id,
            daily_score,
            monthly_score,
        }))
    }
}

fn already_credited(
    tx: &Transaction<'_>,
    user_id: i64,
    submission_id: i64,
) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM user_solved_problem WHERE user_id = ?1 AND submission_id = ?2
         )",
        params![user_id, submission_id],
        |row| row.get(0),
    )
}

/// Add `delta` to the user's row for `daily_object_id`, creating it pre-credited
fn credit_daily(
    tx: &Transaction<'_>,
    user_id: i64,
    daily_object_id: i64,
    delta: i64,
) -> LedgerResult<i64> {
    match daily_score_row(tx, user_id, daily_object_id)? {
        Some(row) => {
            tx.execute(
                "UPDATE user_daily_object SET score_earned = score_earned + ?1 WHERE id = ?2",
                params![delta, row.id],
            )?;
            Ok(row.score_earned + delta)
        }
        None => {
            let id = next_id(tx, Table::UserDailyScore)?;
            tx.execute(
                "INSERT INTO user_daily_object (id, user_id, daily_object_id, score_earned)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, daily_object_id, delta],
            )?;
            Ok(delta)
        }
    }
}

/// Add `delta` to the user's row for `month`, creating it with `delta`
fn credit_monthly(
    tx: &Transaction<'_>,
    user_id: i64,
    month: NaiveDate,
    delta: i64,
) -> LedgerResult<i64> {
    match monthly_score_row(tx, user_id, month)? {
        Some(row) => {
            tx.execute(
                "UPDATE user_monthly_object SET score_earned = score_earned + ?1 WHERE id = ?2",
                params![delta, row.id],
            )?;
            Ok(row.score_earned + delta)
        }
        None => {
            let id = next_id(tx, Table::UserMonthlyScore)?;
            tx.execute(
                "INSERT INTO user_monthly_object (id, user_id, first_day_of_month, score_earned)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, month, delta],
            )?;
            Ok(delta)
        }
    }
}
