//! Units of work run by the crawl scheduler

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reconciler::{ReconcileReport, Reconciler};
use crate::storage::Database;
use crate::utils::Clock;

/// Totals for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub users: usize,
    /// Users the source had no data for
    pub skipped_users: usize,
    pub fetched: usize,
    pub unresolved: usize,
    pub credited: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn absorb(&mut self, report: &ReconcileReport) {
        self.users += 1;
        if report.skipped {
            self.skipped_users += 1;
        }
        self.fetched += report.fetched;
        self.unresolved += report.unresolved;
        self.credited += report.credited;
        self.duplicates += report.duplicates;
        self.failed += report.failed;
    }
}

/// Work performed once per scheduler tick
///
/// An `Err` (or a panic) escaping `run_tick` counts as a failed tick and
/// triggers the restart policy.
#[async_trait]
pub trait CrawlJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run_tick(&self) -> crate::Result<TickReport>;
}

/// Reconciles every user on the current month's leaderboard
pub struct LeaderboardJob {
    db: Arc<Database>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
}

impl LeaderboardJob {
    pub fn new(db: Arc<Database>, reconciler: Arc<Reconciler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            reconciler,
            clock,
        }
    }
}

#[async_trait]
impl CrawlJob for LeaderboardJob {
    fn name(&self) -> &str {
        "leaderboard-reconcile"
    }

    async fn run_tick(&self) -> crate::Result<TickReport> {
        let entries = self.db.current_month_leaderboard(self.clock.as_ref())?;
        let mut tick = TickReport::default();

        // Sequential on purpose: one writer, and the source is rate limited anyway
        for entry in &entries {
            let report = self.reconciler.reconcile(&entry.user).await?;
            tick.absorb(&report);
        }

        tracing::info!(
            users = tick.users,
            credited = tick.credited,
            failed = tick.failed,
            "Crawl tick finished"
        );
        Ok(tick)
    }
}
