//! llc-crawler - submission crawler and score ledger
//!
//! Polls LeetCode for the recent accepted submissions of every user on the
//! community leaderboard and credits each one to the user's daily and monthly
//! score aggregates.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Typed records for every stored entity
//! - [`storage`] - SQLite store, identifier allocator, and score ledger
//! - [`source`] - External activity sources (LeetCode GraphQL)
//! - [`reconciler`] - Turns external submissions into ledger credits
//! - [`scheduler`] - Supervised fixed-interval crawl loop
//! - [`notifications`] - Commit reports and operator alerts
//! - [`utils`] - Clock and calendar helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use llc_crawler::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Arc::new(Database::open(&config.database.sqlite_path)?);
//!     let clock: Arc<dyn Clock> = Arc::new(SystemClock::utc());
//!
//!     let source = Arc::new(LeetCodeClient::from_config(&config.source)?);
//!     let ledger = Arc::new(ScoreLedger::new(db.clone(), clock.clone()));
//!     let reconciler = Arc::new(Reconciler::new(db.clone(), source, ledger));
//!
//!     let job = Arc::new(LeaderboardJob::new(db.clone(), reconciler, clock));
//!     let scheduler = CrawlScheduler::new(job, db.notifier().clone());
//!     scheduler.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod reconciler;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{CrawlerErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{Problem, RecentSubmission, User};
    pub use crate::notifications::{LogNotifier, Notifier};
    pub use crate::reconciler::{ReconcileReport, Reconciler};
    pub use crate::scheduler::{CrawlJob, CrawlScheduler, LeaderboardJob, RestartPolicy};
    pub use crate::source::{LeetCodeClient, SubmissionSource};
    pub use crate::storage::{Database, Registration, ScoreLedger};
    pub use crate::utils::{Clock, SystemClock};
}

// Direct re-exports for convenience
pub use error::{Error, Result};
