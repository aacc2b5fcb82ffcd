//! Integration tests for the like reconciler against a real Postgres.
//!
//! Covers the per-event state machine, idempotent redelivery, the counter
//! floor, conservation between ledger and relationship, and racing
//! deliveries of the same event id.

mod common;

use crate::common::{create_test_post, like, likes_count, unlike, TestHarness};
use post_service_core::common::{LikeEventId, UserId};
use post_service_core::domains::likes::effects::{ReconcileError, ReconcileOutcome};
use post_service_core::domains::likes::models::{
    LedgerInsert, LedgerOutcome, PostLike, ProcessedEvent,
};
use post_service_core::domains::likes::events::LikeEventKind;
use post_service_core::domains::posts::models::Post;
use test_context::test_context;

fn applied(outcome: ReconcileOutcome) -> ProcessedEvent {
    match outcome {
        ReconcileOutcome::Applied(entry) => entry,
        ReconcileOutcome::AlreadyProcessed => panic!("expected the event to be applied"),
    }
}

// =============================================================================
// Single transitions
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn first_like_creates_relationship_and_increments(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let envelope = like(post.id, user_id);

    let entry = applied(ctx.reconciler().reconcile(&envelope).await.unwrap());

    assert_eq!(entry.event_id, envelope.event_id);
    assert_eq!(entry.kind, LikeEventKind::Like);
    assert_eq!(entry.outcome, LedgerOutcome::Processed);
    assert!(PostLike::find(post.id, user_id, &ctx.db_pool).await.unwrap().is_some());
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn redelivered_event_is_a_noop(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let envelope = like(post.id, UserId::new());
    let reconciler = ctx.reconciler();

    applied(reconciler.reconcile(&envelope).await.unwrap());
    let again = reconciler.reconcile(&envelope).await.unwrap();

    assert_eq!(again, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
    assert_eq!(PostLike::count_by_post(post.id, &ctx.db_pool).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unlike_without_like_records_not_found(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();

    let entry = applied(ctx.reconciler().reconcile(&unlike(post.id, user_id)).await.unwrap());

    assert_eq!(entry.outcome, LedgerOutcome::NotFoundNoop);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(0));
    assert!(PostLike::find(post.id, user_id, &ctx.db_pool).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn second_like_for_same_pair_is_duplicate(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let reconciler = ctx.reconciler();

    applied(reconciler.reconcile(&like(post.id, user_id)).await.unwrap());
    let entry = applied(reconciler.reconcile(&like(post.id, user_id)).await.unwrap());

    assert_eq!(entry.outcome, LedgerOutcome::Duplicate);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn like_for_deleted_post_records_not_found(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let envelope = like(post.id, UserId::new());
    Post::delete(post.id, &ctx.db_pool).await.unwrap();

    let entry = applied(ctx.reconciler().reconcile(&envelope).await.unwrap());

    assert_eq!(entry.outcome, LedgerOutcome::NotFoundNoop);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, None);
    let recorded = ProcessedEvent::find_by_event_id(envelope.event_id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(recorded, Some(entry));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unlike_removes_relationship_and_decrements(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let reconciler = ctx.reconciler();

    applied(reconciler.reconcile(&like(post.id, user_id)).await.unwrap());
    let entry = applied(reconciler.reconcile(&unlike(post.id, user_id)).await.unwrap());

    assert_eq!(entry.outcome, LedgerOutcome::Processed);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(0));
    assert!(PostLike::find(post.id, user_id, &ctx.db_pool).await.unwrap().is_none());
}

// =============================================================================
// Properties
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn n_deliveries_apply_once(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let envelope = like(post.id, user_id);
    let reconciler = ctx.reconciler();

    let mut applied_count = 0;
    for _ in 0..5 {
        if let ReconcileOutcome::Applied(_) = reconciler.reconcile(&envelope).await.unwrap() {
            applied_count += 1;
        }
    }

    assert_eq!(applied_count, 1);
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
    let ledger = ProcessedEvent::find_by_post_and_user(post.id, user_id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn counter_never_goes_negative(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let reconciler = ctx.reconciler();

    for envelope in [
        unlike(post.id, user_id),
        unlike(post.id, user_id),
        like(post.id, user_id),
        unlike(post.id, user_id),
        unlike(post.id, user_id),
    ] {
        reconciler.reconcile(&envelope).await.unwrap();
        let count = likes_count(post.id, &ctx.db_pool).await.unwrap();
        assert!(count >= 0, "likes_count went negative: {}", count);
    }

    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(0));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_unlikes_decrement_once(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let reconciler = ctx.reconciler();
    applied(reconciler.reconcile(&like(post.id, user_id)).await.unwrap());

    let unlikes: Vec<_> = (0..4).map(|_| unlike(post.id, user_id)).collect();
    let results = futures::future::join_all(unlikes.iter().map(|e| reconciler.reconcile(e))).await;

    let outcomes: Vec<LedgerOutcome> = results
        .into_iter()
        .map(|r| applied(r.unwrap()).outcome)
        .collect();
    assert_eq!(
        outcomes.iter().filter(|o| **o == LedgerOutcome::Processed).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == LedgerOutcome::NotFoundNoop).count(),
        3
    );
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(0));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn ledger_relationship_and_counter_agree(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let alice = UserId::new();
    let bob = UserId::new();
    let carol = UserId::new();
    let reconciler = ctx.reconciler();

    let script = [
        like(post.id, alice),
        like(post.id, bob),
        like(post.id, alice),
        unlike(post.id, carol),
        like(post.id, carol),
        unlike(post.id, bob),
        unlike(post.id, bob),
        like(post.id, bob),
    ];
    for envelope in &script {
        reconciler.reconcile(envelope).await.unwrap();
    }

    let net = ProcessedEvent::net_processed_likes(post.id, &ctx.db_pool).await.unwrap();
    let relationships = PostLike::count_by_post(post.id, &ctx.db_pool).await.unwrap();
    let counter = likes_count(post.id, &ctx.db_pool).await.unwrap();

    assert_eq!(net, 3);
    assert_eq!(relationships, 3);
    assert_eq!(i64::from(counter), 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn racing_deliveries_of_one_event_apply_once(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let envelope = like(post.id, user_id);
    let first = ctx.reconciler();
    let second = ctx.reconciler();

    let (a, b) = tokio::join!(first.reconcile(&envelope), second.reconcile(&envelope));

    // Whichever delivery loses is absorbed, never surfaced as an error.
    let outcomes = [a.unwrap(), b.unwrap()];
    let applied_count = outcomes
        .iter()
        .filter(|o| matches!(o, ReconcileOutcome::Applied(_)))
        .count();
    assert_eq!(applied_count, 1);
    assert!(outcomes.contains(&ReconcileOutcome::AlreadyProcessed));

    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
    let ledger = ProcessedEvent::find_by_post_and_user(post.id, user_id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].outcome, LedgerOutcome::Processed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn many_users_liking_at_once_are_all_counted(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let reconciler = ctx.reconciler();

    let envelopes: Vec<_> = (0..20).map(|_| like(post.id, UserId::new())).collect();
    let results = futures::future::join_all(envelopes.iter().map(|e| reconciler.reconcile(e))).await;

    for result in results {
        assert_eq!(applied(result.unwrap()).outcome, LedgerOutcome::Processed);
    }
    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(20));
    assert_eq!(PostLike::count_by_post(post.id, &ctx.db_pool).await.unwrap(), 20);
    assert_eq!(
        ProcessedEvent::net_processed_likes(post.id, &ctx.db_pool).await.unwrap(),
        20
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn racing_likes_for_one_pair_count_once(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let user_id = UserId::new();
    let first_like = like(post.id, user_id);
    let second_like = like(post.id, user_id);
    let reconciler = ctx.reconciler();

    let (a, b) = tokio::join!(
        reconciler.reconcile(&first_like),
        reconciler.reconcile(&second_like)
    );

    // A pair conflict is retried by the consumer; the retry sees the like.
    for (result, envelope) in [(a, &first_like), (b, &second_like)] {
        match result {
            Ok(outcome) => {
                applied(outcome);
            }
            Err(ReconcileError::Conflict { .. }) => {
                let retry = applied(reconciler.reconcile(envelope).await.unwrap());
                assert_eq!(retry.outcome, LedgerOutcome::Duplicate);
            }
            Err(e) => panic!("unexpected reconcile error: {}", e),
        }
    }

    assert_eq!(likes_count(post.id, &ctx.db_pool).await, Some(1));
    assert_eq!(PostLike::count_by_post(post.id, &ctx.db_pool).await.unwrap(), 1);
    let mut outcomes: Vec<_> = ProcessedEvent::find_by_post_and_user(post.id, user_id, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.outcome)
        .collect();
    outcomes.sort_by_key(|o| o.as_str());
    assert_eq!(outcomes, vec![LedgerOutcome::Duplicate, LedgerOutcome::Processed]);
}

// =============================================================================
// Ledger store
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn ledger_rejects_second_entry_for_event_id(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let event_id = LikeEventId::new();
    let user_id = UserId::new();

    let first = ProcessedEvent::insert(
        event_id,
        LikeEventKind::Like,
        post.id,
        user_id,
        LedgerOutcome::Processed,
        &ctx.db_pool,
    )
    .await
    .unwrap();
    assert!(matches!(first, LedgerInsert::Recorded(_)));

    let second = ProcessedEvent::insert(
        event_id,
        LikeEventKind::Like,
        post.id,
        user_id,
        LedgerOutcome::Duplicate,
        &ctx.db_pool,
    )
    .await
    .unwrap();
    assert!(matches!(second, LedgerInsert::AlreadyRecorded));

    let stored = ProcessedEvent::find_by_event_id(event_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.outcome, LedgerOutcome::Processed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn ledger_outlives_deleted_post(ctx: &TestHarness) {
    let post = create_test_post(&ctx.db_pool).await;
    let envelope = like(post.id, UserId::new());
    applied(ctx.reconciler().reconcile(&envelope).await.unwrap());

    Post::delete(post.id, &ctx.db_pool).await.unwrap();

    assert!(ProcessedEvent::find_by_event_id(envelope.event_id, &ctx.db_pool)
        .await
        .unwrap()
        .is_some());
    assert_eq!(PostLike::count_by_post(post.id, &ctx.db_pool).await.unwrap(), 0);
}
