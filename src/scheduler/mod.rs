//! Crawl scheduling
//!
//! One recurring loop per process. Every tick runs a [`CrawlJob`] (in
//! production the [`LeaderboardJob`], which reconciles every user on this
//! month's leaderboard). A tick that fails, by error or by panic, is reported
//! to the operator channel and the loop restarts under a [`RestartPolicy`].
//!
//! # State machine
//!
//! ```text
//!              start()                 tick fails
//!   Stopped ───────────▶ Running ─────────────────▶ Recovering
//!      ▲                  │   ▲                        │
//!      │     stop()       │   │   backoff elapsed      │
//!      └──────────────────┘   └────────────────────────┘
//!      ▲                                               │
//!      └────────── restart bound exceeded ─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`crawl`] - the scheduler handle and its supervisor task
//! - [`job`] - the unit of work and its per-tick report
//! - [`policy`] - restart backoff and failure bound
//! - [`error`] - lifecycle errors
//!
//! # Example
//!
//! ```ignore
//! use llc_crawler::scheduler::{CrawlScheduler, LeaderboardJob, RestartPolicy};
//!
//! let job = Arc::new(LeaderboardJob::new(db, reconciler, clock));
//! let scheduler = CrawlScheduler::new(job, notifier)
//!     .with_interval(Duration::from_secs(10))
//!     .with_policy(RestartPolicy::default());
//!
//! scheduler.start().await?;
//! // ...
//! scheduler.stop().await?;
//! ```

pub mod crawl;
pub mod error;
pub mod job;
pub mod policy;

pub use crawl::{CrawlScheduler, SchedulerState, SchedulerStatus, DEFAULT_TICK_INTERVAL};
pub use error::{SchedulerError, SchedulerResult};
pub use job::{CrawlJob, LeaderboardJob, TickReport};
pub use policy::RestartPolicy;
