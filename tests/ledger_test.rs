//! Integration tests for the score ledger

mod common;

use common::{date, fixture};
use llc_crawler::error::CrawlerErrorTrait;
use llc_crawler::storage::{
    DailyCreditPolicy, DuplicatePolicy, LedgerError, LedgerPolicy, Registration,
    SCORE_PER_SUBMISSION,
};

#[test]
fn test_credit_scenario_with_existing_monthly_score() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.db.execute_batch(&format!(
        "UPDATE user_monthly_object SET score_earned = 10 WHERE user_id = {}",
        user.id
    ))
    .unwrap();

    let outcome = f
        .ledger()
        .register_submission(user.id, f.problems[1], 1_234_567)
        .unwrap();
    assert!(outcome.is_credited());

    assert_eq!(f.monthly(user.id), Some(12));
    assert_eq!(f.daily(user.id), Some(2));

    let solved = f.db.solved_problems(user.id).unwrap();
    assert_eq!(solved.len(), 1);
    assert_eq!(solved[0].submission_id, 1_234_567);
    assert_eq!(solved[0].problem_id, f.problems[1]);

    assert_eq!(f.notifier.successes(), 1);
    let report = &f.notifier.notifications()[0];
    assert!(report.body.contains("submission_id=1234567"));
}

#[test]
fn test_first_credit_of_month_creates_monthly_row() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.clock.set(date(2024, 6, 1));
    f.db.create_daily_object(date(2024, 6, 1), f.problems[2]).unwrap();

    f.ledger()
        .register_submission(user.id, f.problems[2], 1)
        .unwrap();

    assert_eq!(f.db.monthly_score(user.id, date(2024, 6, 1)).unwrap(), Some(SCORE_PER_SUBMISSION));
    // May's row is untouched
    assert_eq!(f.monthly(user.id), Some(0));
}

#[test]
fn test_failed_monthly_step_leaves_no_partial_credit() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.db.execute_batch(
        "CREATE TRIGGER fail_monthly BEFORE UPDATE ON user_monthly_object
         BEGIN SELECT RAISE(ABORT, 'forced monthly failure'); END;",
    )
    .unwrap();

    let err = f
        .ledger()
        .register_submission(user.id, f.problems[0], 77)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));

    assert_eq!(f.db.solved_count(user.id).unwrap(), 0);
    assert_eq!(f.daily(user.id), None);
    assert_eq!(f.monthly(user.id), Some(0));

    assert_eq!(f.notifier.failures(), 1);
    assert_eq!(f.notifier.successes(), 0);
}

#[test]
fn test_missing_daily_object_is_reported_and_retryable() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    let tomorrow = date(2024, 5, 2);
    f.clock.set(tomorrow);

    let ledger = f.ledger();
    let err = ledger.register_submission(user.id, f.problems[0], 5).unwrap_err();
    assert!(matches!(err, LedgerError::NoDailyObject { date } if date == tomorrow));
    assert!(err.is_recoverable());
    assert_eq!(f.db.solved_count(user.id).unwrap(), 0);
    assert_eq!(f.notifier.failures(), 1);

    // Once the daily job has run the same submission goes through
    f.db.create_daily_object(tomorrow, f.problems[3]).unwrap();
    assert!(ledger.register_submission(user.id, f.problems[0], 5).unwrap().is_credited());
    assert_eq!(f.db.daily_score(user.id, tomorrow).unwrap(), Some(2));
}

#[test]
fn test_one_daily_row_per_user_and_day() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    let ledger = f.ledger();

    for (i, problem) in f.problems.iter().enumerate() {
        ledger.register_submission(user.id, *problem, i as i64).unwrap();
    }

    // Four credits accumulated on a single row
    assert_eq!(f.daily(user.id), Some(2 * f.problems.len() as i64));
    assert_eq!(f.monthly(user.id), Some(8));
}

#[test]
fn test_designated_only_policy() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    let ledger = f.ledger_with(LedgerPolicy {
        daily_credit: DailyCreditPolicy::DesignatedOnly,
        duplicates: DuplicatePolicy::Allow,
    });

    ledger.register_submission(user.id, f.problems[1], 1).unwrap();
    assert_eq!(f.daily(user.id), None);
    assert_eq!(f.monthly(user.id), Some(2));

    ledger.register_submission(user.id, f.problems[0], 2).unwrap();
    assert_eq!(f.daily(user.id), Some(2));
    assert_eq!(f.monthly(user.id), Some(4));
}

#[test]
fn test_duplicate_policies() {
    let f = fixture();
    let alice = f.add_user("1001", "alice");
    let bob = f.add_user("1002", "bob");

    let allow = f.ledger();
    allow.register_submission(alice.id, f.problems[0], 9).unwrap();
    allow.register_submission(alice.id, f.problems[0], 9).unwrap();
    assert_eq!(f.db.solved_count(alice.id).unwrap(), 2);
    assert_eq!(f.monthly(alice.id), Some(4));

    let skip = f.ledger_with(LedgerPolicy {
        duplicates: DuplicatePolicy::Skip,
        ..Default::default()
    });
    assert!(skip.register_submission(bob.id, f.problems[0], 9).unwrap().is_credited());
    assert_eq!(
        skip.register_submission(bob.id, f.problems[0], 9).unwrap(),
        Registration::Duplicate
    );
    assert_eq!(f.db.solved_count(bob.id).unwrap(), 1);
    assert_eq!(f.monthly(bob.id), Some(2));
}
