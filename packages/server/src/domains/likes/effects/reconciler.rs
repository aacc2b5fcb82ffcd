//! Applies like/unlike envelopes to durable state, once per event id.
//!
//! One envelope is one transaction:
//!
//! ```text
//! BEGIN
//!   ledger lookup ── hit ──────────────────────────► ROLLBACK, already processed
//!   lock pair row (FOR UPDATE)
//!   LikeMachine::decide(kind, liked?)
//!   ├─ InsertLike:  likes_count + 1 ── post gone ──► not_found_noop
//!   │               insert pair ── pair taken ──────► ROLLBACK, ledger has event id?
//!   │                                                  ├─ yes: already processed
//!   │                                                  └─ no:  conflict (retry)
//!   ├─ DeleteLike:  delete pair, likes_count - 1 (clamped)
//!   └─ RecordOnly:  nothing
//!   ledger insert ── event id taken ───────────────► ROLLBACK, already processed
//! COMMIT
//! ```
//!
//! Any error rolls the whole transaction back. The caller then leaves the
//! message unacknowledged and the broker redelivers it.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{debug, info};

use crate::common::{PostId, UserId};
use crate::domains::likes::events::LikeEnvelope;
use crate::domains::likes::machines::{LikeMachine, LikeTransition};
use crate::domains::likes::models::{
    is_unique_violation, LedgerInsert, LedgerOutcome, PostLike, ProcessedEvent,
    POST_LIKE_PAIR_CONSTRAINT,
};
use crate::domains::posts::models::Post;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Store unavailable, timeout, or anything else that may heal.
    #[error("transient reconcile failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// Another transition inserted the same pair first. A retry re-reads it.
    #[error("concurrent like for post {post_id} by user {user_id}")]
    Conflict { post_id: PostId, user_id: UserId },
}

impl From<anyhow::Error> for ReconcileError {
    fn from(error: anyhow::Error) -> Self {
        ReconcileError::Transient(error)
    }
}

impl From<sqlx::Error> for ReconcileError {
    fn from(error: sqlx::Error) -> Self {
        ReconcileError::Transient(error.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This attempt wrote the ledger entry.
    Applied(ProcessedEvent),
    /// The event id was already in the ledger, or another attempt won the
    /// race to write it. Nothing was changed.
    AlreadyProcessed,
}

/// Something that applies envelopes; the consumer only depends on this.
#[async_trait]
pub trait EnvelopeApplier: Send + Sync {
    async fn apply(&self, envelope: &LikeEnvelope) -> Result<ReconcileOutcome, ReconcileError>;
}

enum Step {
    Commit(ProcessedEvent),
    Discard,
}

#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn reconcile(&self, envelope: &LikeEnvelope) -> Result<ReconcileOutcome, ReconcileError> {
        let mut tx = self.pool.begin().await?;

        match transition(&mut tx, envelope).await {
            Ok(Step::Commit(entry)) => {
                tx.commit().await?;
                info!(
                    event_id = %entry.event_id,
                    kind = %entry.kind,
                    post_id = %entry.post_id,
                    user_id = %entry.user_id,
                    outcome = %entry.outcome,
                    "like event reconciled"
                );
                Ok(ReconcileOutcome::Applied(entry))
            }
            Ok(Step::Discard) => {
                tx.rollback().await?;
                debug!(event_id = %envelope.event_id, "like event already processed");
                Ok(ReconcileOutcome::AlreadyProcessed)
            }
            Err(ReconcileError::Conflict { post_id, user_id }) => {
                let _ = tx.rollback().await;
                // A concurrent delivery of this same event inserted the pair.
                if ProcessedEvent::find_by_event_id(envelope.event_id, &self.pool)
                    .await?
                    .is_some()
                {
                    debug!(event_id = %envelope.event_id, "lost race to a concurrent delivery");
                    return Ok(ReconcileOutcome::AlreadyProcessed);
                }
                Err(ReconcileError::Conflict { post_id, user_id })
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EnvelopeApplier for Reconciler {
    async fn apply(&self, envelope: &LikeEnvelope) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(envelope).await
    }
}

async fn transition(conn: &mut PgConnection, envelope: &LikeEnvelope) -> Result<Step, ReconcileError> {
    if ProcessedEvent::find_by_event_id(envelope.event_id, &mut *conn)
        .await?
        .is_some()
    {
        return Ok(Step::Discard);
    }

    let existing = PostLike::find_for_update(envelope.post_id, envelope.user_id, &mut *conn).await?;
    let outcome = match LikeMachine::decide(envelope.kind, existing.is_some()) {
        LikeTransition::InsertLike => insert_like(conn, envelope).await?,
        LikeTransition::DeleteLike => delete_like(conn, envelope).await?,
        LikeTransition::RecordOnly(outcome) => outcome,
    };

    let inserted = ProcessedEvent::insert(
        envelope.event_id,
        envelope.kind,
        envelope.post_id,
        envelope.user_id,
        outcome,
        &mut *conn,
    )
    .await?;

    Ok(match inserted {
        LedgerInsert::Recorded(entry) => Step::Commit(entry),
        LedgerInsert::AlreadyRecorded => Step::Discard,
    })
}

async fn insert_like(conn: &mut PgConnection, envelope: &LikeEnvelope) -> Result<LedgerOutcome, ReconcileError> {
    // Counter first: it both checks the post still exists and locks its row
    // against deletion until commit.
    if Post::adjust_like_count(envelope.post_id, 1, &mut *conn)
        .await?
        .is_none()
    {
        return Ok(LedgerOutcome::NotFoundNoop);
    }

    match PostLike::insert(
        envelope.post_id,
        envelope.user_id,
        envelope.occurred_at,
        &mut *conn,
    )
    .await
    {
        Ok(_) => Ok(LedgerOutcome::Processed),
        Err(e) if is_unique_violation(&e, POST_LIKE_PAIR_CONSTRAINT) => Err(ReconcileError::Conflict {
            post_id: envelope.post_id,
            user_id: envelope.user_id,
        }),
        Err(e) => Err(e.into()),
    }
}

async fn delete_like(conn: &mut PgConnection, envelope: &LikeEnvelope) -> Result<LedgerOutcome, ReconcileError> {
    if PostLike::delete(envelope.post_id, envelope.user_id, &mut *conn)
        .await?
        .is_none()
    {
        return Ok(LedgerOutcome::NotFoundNoop);
    }

    match Post::adjust_like_count(envelope.post_id, -1, &mut *conn).await? {
        Some(_) => Ok(LedgerOutcome::Processed),
        None => Ok(LedgerOutcome::NotFoundNoop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_transient() {
        let err: ReconcileError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ReconcileError::Transient(_)));
    }
}
