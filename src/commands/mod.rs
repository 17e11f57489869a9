pub mod crawl;
pub mod db;

use std::sync::Arc;

use anyhow::{Context, Result};

use llc_crawler::config::Config;
use llc_crawler::notifications::{FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
use llc_crawler::reconciler::Reconciler;
use llc_crawler::scheduler::{CrawlScheduler, LeaderboardJob};
use llc_crawler::source::LeetCodeClient;
use llc_crawler::storage::{Database, ScoreLedger};
use llc_crawler::utils::{Clock, SystemClock};

// Re-export command functions for convenience
pub use crawl::{reconcile, run, tick};
pub use db::{init_db, leaderboard};

/// Everything a command needs, wired from one [`Config`]
pub struct Components {
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub reconciler: Arc<Reconciler>,
}

impl Components {
    pub fn build(config: &Config) -> Result<Self> {
        let mut fanout = FanoutNotifier::new().with(Arc::new(LogNotifier::new()));
        if let Some(webhook) = config.notifications.webhook() {
            let sink = WebhookNotifier::new(webhook).context("Failed to create webhook notifier")?;
            fanout = fanout.with(Arc::new(sink));
        }
        let notifier: Arc<dyn Notifier> = Arc::new(fanout);

        let db = Database::open(&config.database.sqlite_path)
            .with_context(|| {
                format!("Failed to open database {}", config.database.sqlite_path.display())
            })?
            .with_notifier(notifier.clone());
        let db = Arc::new(db);

        let clock: Arc<dyn Clock> =
            Arc::new(SystemClock::from_offset_hours(config.crawler.utc_offset_hours)?);

        let source = LeetCodeClient::from_config(&config.source)
            .context("Failed to create source client")?;
        let ledger = ScoreLedger::new(db.clone(), clock.clone()).with_policy(config.ledger);
        let reconciler = Reconciler::new(db.clone(), Arc::new(source), Arc::new(ledger))
            .with_limit(config.crawler.submission_limit);

        Ok(Self {
            db,
            clock,
            notifier,
            reconciler: Arc::new(reconciler),
        })
    }

    pub fn job(&self) -> LeaderboardJob {
        LeaderboardJob::new(self.db.clone(), self.reconciler.clone(), self.clock.clone())
    }

    pub fn scheduler(&self, config: &Config) -> CrawlScheduler {
        CrawlScheduler::new(Arc::new(self.job()), self.notifier.clone())
            .with_interval(config.interval())
            .with_policy(config.supervisor.clone())
    }
}
