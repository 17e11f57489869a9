//! Integration tests for submission reconciliation

mod common;

use common::{fixture, submissions};
use llc_crawler::storage::{DuplicatePolicy, LedgerPolicy};
use llc_crawler::reconciler::Reconciler;

#[tokio::test]
async fn test_resolvable_submissions_are_all_credited() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.source.set(
        "alice",
        submissions(&[
            (40, "median-of-two-sorted-arrays"),
            (30, "longest-substring-without-repeating-characters"),
            (20, "add-two-numbers"),
        ]),
    );

    let report = f.reconciler().reconcile(&user).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.credited, 3);
    assert_eq!(f.db.solved_count(user.id).unwrap(), 3);
    assert_eq!(f.monthly(user.id), Some(6));
    assert_eq!(f.daily(user.id), Some(6));
    assert_eq!(f.notifier.successes(), 3);
}

#[tokio::test]
async fn test_submissions_registered_in_source_order() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.source.set("alice", submissions(&[(3, "two-sum"), (2, "add-two-numbers"), (1, "two-sum")]));

    f.reconciler().reconcile(&user).await.unwrap();

    let order: Vec<i64> = f
        .db
        .solved_problems(user.id)
        .unwrap()
        .iter()
        .map(|s| s.submission_id)
        .collect();
    assert_eq!(order, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_rerun_without_new_activity_double_counts() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.source.set("alice", submissions(&[(8, "two-sum"), (7, "add-two-numbers")]));

    let reconciler = f.reconciler();
    reconciler.reconcile(&user).await.unwrap();
    reconciler.reconcile(&user).await.unwrap();

    // Nothing remembers which submissions were already credited
    assert_eq!(f.db.solved_count(user.id).unwrap(), 4);
    assert_eq!(f.monthly(user.id), Some(8));
}

#[tokio::test]
async fn test_rerun_with_skip_policy_is_idempotent() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.source.set("alice", submissions(&[(8, "two-sum"), (7, "add-two-numbers")]));

    let ledger = f.ledger_with(LedgerPolicy {
        duplicates: DuplicatePolicy::Skip,
        ..Default::default()
    });
    let reconciler = Reconciler::new(f.db.clone(), f.source.clone(), ledger);

    reconciler.reconcile(&user).await.unwrap();
    let second = reconciler.reconcile(&user).await.unwrap();

    assert_eq!(second.credited, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(f.db.solved_count(user.id).unwrap(), 2);
    assert_eq!(f.monthly(user.id), Some(4));
}

#[tokio::test]
async fn test_registration_failures_do_not_stop_the_user() {
    let f = fixture();
    let user = f.add_user("1001", "alice");
    f.source.set("alice", submissions(&[(2, "two-sum"), (1, "unknown-problem")]));

    // No daily object for the clock's date: every registration rolls back
    f.clock.set(common::date(2024, 5, 3));
    let report = f.reconciler().reconcile(&user).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.credited, 0);
    assert_eq!(f.db.solved_count(user.id).unwrap(), 0);
    assert_eq!(f.notifier.failures(), 1);
}

#[tokio::test]
async fn test_source_without_data_skips_user() {
    let f = fixture();
    let user = f.add_user("1001", "alice");

    let report = f.reconciler().reconcile(&user).await.unwrap();

    assert!(report.skipped);
    assert_eq!(f.source.calls(), 1);
    assert_eq!(f.monthly(user.id), Some(0));
}
