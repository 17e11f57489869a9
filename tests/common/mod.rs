//! Common test utilities

use std::sync::Arc;

use chrono::NaiveDate;
use llc_crawler::models::{Difficulty, NewProblem, NewUser, RecentSubmission, User};
use llc_crawler::notifications::MemoryNotifier;
use llc_crawler::reconciler::Reconciler;
use llc_crawler::source::StaticSource;
use llc_crawler::storage::{Database, LedgerPolicy, ScoreLedger};
use llc_crawler::utils::FixedClock;

/// Catalog seeded by [`fixture`], in id order
pub const SLUGS: &[(&str, Difficulty)] = &[
    ("two-sum", Difficulty::Easy),
    ("add-two-numbers", Difficulty::Medium),
    ("longest-substring-without-repeating-characters", Difficulty::Medium),
    ("median-of-two-sorted-arrays", Difficulty::Hard),
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2024-05-01, the date every fixture starts on
pub fn today() -> NaiveDate {
    date(2024, 5, 1)
}

/// In-memory store with a problem catalog and a daily object for [`today`]
pub struct Fixture {
    pub db: Arc<Database>,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: Arc<FixedClock>,
    pub source: Arc<StaticSource>,
    /// Problem ids in [`SLUGS`] order; the first one is today's designated problem
    pub problems: Vec<i64>,
    pub daily_object_id: i64,
}

pub fn fixture() -> Fixture {
    let notifier = Arc::new(MemoryNotifier::new());
    let db = Arc::new(Database::in_memory().unwrap().with_notifier(notifier.clone()));

    let problems: Vec<i64> = SLUGS
        .iter()
        .map(|(slug, difficulty)| {
            db.create_problem(&NewProblem::new(slug.replace('-', " "), *slug, *difficulty))
                .unwrap()
        })
        .collect();
    let daily_object_id = db.create_daily_object(today(), problems[0]).unwrap();
    notifier.clear();

    Fixture {
        db,
        notifier,
        clock: Arc::new(FixedClock::new(today())),
        source: Arc::new(StaticSource::new()),
        problems,
        daily_object_id,
    }
}

#[allow(dead_code)]
impl Fixture {
    /// Onboard a user and put them on this month's leaderboard
    pub fn add_user(&self, discord_id: &str, handle: &str) -> User {
        let id = self
            .db
            .create_user(&NewUser {
                discord_id: discord_id.to_string(),
                leetcode_username: handle.to_string(),
                most_recent_sub_id: -1,
                solved_slugs: Vec::new(),
            })
            .unwrap();
        self.db.create_monthly_object(id, today()).unwrap();
        self.notifier.clear();
        self.db.user(id).unwrap().unwrap()
    }

    pub fn ledger(&self) -> Arc<ScoreLedger> {
        self.ledger_with(LedgerPolicy::default())
    }

    pub fn ledger_with(&self, policy: LedgerPolicy) -> Arc<ScoreLedger> {
        Arc::new(ScoreLedger::new(self.db.clone(), self.clock.clone()).with_policy(policy))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.db.clone(), self.source.clone(), self.ledger())
    }

    pub fn monthly(&self, user_id: i64) -> Option<i64> {
        self.db.monthly_score(user_id, today()).unwrap()
    }

    pub fn daily(&self, user_id: i64) -> Option<i64> {
        self.db.daily_score(user_id, today()).unwrap()
    }
}

/// Newest-first submissions, one per `(id, slug)` pair
#[allow(dead_code)]
pub fn submissions(items: &[(i64, &str)]) -> Vec<RecentSubmission> {
    items
        .iter()
        .map(|(id, slug)| RecentSubmission::new(*id, *slug))
        .collect()
}
