//! Relational store for users, problems, and score aggregates
//!
//! The whole process shares one [`Database`] handle. It owns a single SQLite
//! connection behind a mutex and the notification sink that every commit
//! attempt is reported to. Components receive it as an `Arc<Database>`; there
//! is no module-level engine.
//!
//! # Layout
//!
//! - [`allocator`] - gap-filling identifier allocation inside a transaction
//! - [`ledger`] - the score ledger (submission credit + daily/monthly aggregates)
//! - `catalog` - onboarding/catalog writes and the read queries
//!
//! # Example
//!
//! ```rust,ignore
//! use llc_crawler::storage::Database;
//!
//! let db = Database::open("data/llc.db")?;
//! let problem = db.problem_by_slug("two-sum")?;
//! ```

pub mod allocator;
mod catalog;
pub mod ledger;

use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::error::{CrawlerErrorTrait, ErrorCategory};
use crate::notifications::{LogNotifier, Notifier};

pub use allocator::Table;
pub use ledger::{
    CreditReceipt, DailyCreditPolicy, DuplicatePolicy, LedgerError, LedgerPolicy, Registration,
    ScoreLedger, SCORE_PER_SUBMISSION,
};

/// Errors raised by the relational store
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection
    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// Filesystem error while preparing the database path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlerErrorTrait for StorageError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            Self::Sqlite(_) => false,
            Self::LockPoisoned => false,
            Self::Io(_) => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        discord_id TEXT NOT NULL UNIQUE,
        leetcode_username TEXT NOT NULL,
        most_recent_sub_id INTEGER NOT NULL DEFAULT -1
    );

    CREATE INDEX IF NOT EXISTS idx_users_leetcode_username
        ON users(leetcode_username);

    CREATE TABLE IF NOT EXISTS topic (
        id INTEGER PRIMARY KEY,
        topic_name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS problem (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        title_slug TEXT NOT NULL UNIQUE,
        difficulty TEXT NOT NULL,
        is_premium INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS problem_topic (
        problem_id INTEGER NOT NULL REFERENCES problem(id),
        topic_id INTEGER NOT NULL REFERENCES topic(id),
        PRIMARY KEY (problem_id, topic_id)
    );

    CREATE TABLE IF NOT EXISTS user_solved_problem (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        problem_id INTEGER NOT NULL REFERENCES problem(id),
        submission_id INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_user_solved_problem_submission
        ON user_solved_problem(user_id, submission_id);

    CREATE TABLE IF NOT EXISTS daily_object (
        id INTEGER PRIMARY KEY,
        generated_date TEXT NOT NULL UNIQUE,
        problem_id INTEGER NOT NULL REFERENCES problem(id)
    );

    CREATE TABLE IF NOT EXISTS user_daily_object (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        daily_object_id INTEGER NOT NULL REFERENCES daily_object(id),
        score_earned INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, daily_object_id)
    );

    CREATE TABLE IF NOT EXISTS user_monthly_object (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        first_day_of_month TEXT NOT NULL,
        score_earned INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, first_day_of_month)
    );
"#;

/// Shared store handle
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
    notifier: Arc<dyn Notifier>,
}

impl Database {
    /// Open (or create) a file-backed database
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite database initialized");
        Ok(db)
    }

    /// Create in-memory database (for testing and dry runs)
    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: Arc::new(LogNotifier::new()),
        })
    }

    /// Replace the notification sink commit attempts are reported to
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Notification sink shared with the ledger
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Run raw SQL outside any managed transaction
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Run a read-only query against the connection
    pub(crate) fn read<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Run `f` inside one write transaction
    ///
    /// The transaction starts with `BEGIN IMMEDIATE` and is committed only if
    /// `f` returns `Ok`. Any error (from `f` or from the commit) rolls every
    /// statement back.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let value = f(&tx)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }

    /// Report the outcome of a commit attempt to the notification sink
    pub(crate) fn report_commit<T, E: Display>(&self, context: &str, result: &Result<T, E>) {
        match result {
            Ok(_) => self.notifier.report(true, context, ""),
            Err(e) => self.notifier.report(false, context, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("llc.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let tables: i64 = db
            .read(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(tables, 8);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("llc.db");

        drop(Database::open(&path).unwrap());
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();

        let result: StorageResult<()> = db.write(|tx| {
            tx.execute("INSERT INTO topic (id, topic_name) VALUES (0, 'Array')", [])?;
            tx.execute("INSERT INTO topic (id, topic_name) VALUES (1, 'Array')", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM topic", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_busy_error_is_recoverable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StorageError::Sqlite(busy).is_recoverable());
        assert!(!StorageError::LockPoisoned.is_recoverable());
    }
}
