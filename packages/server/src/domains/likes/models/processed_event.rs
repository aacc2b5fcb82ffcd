use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use std::str::FromStr;

use crate::common::{LikeEventId, PostId, UserId};
use crate::domains::likes::events::LikeEventKind;

/// Unique constraint that makes the ledger the final arbiter.
pub const LEDGER_EVENT_ID_CONSTRAINT: &str = "processed_events_event_id_key";

/// How an event id was resolved. Terminal once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOutcome {
    /// The Like relationship and counter were changed.
    Processed,
    /// Like for a pair that was already liked.
    Duplicate,
    /// Unlike for a pair that was not liked, or the post is gone.
    NotFoundNoop,
}

impl LedgerOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerOutcome::Processed => "processed",
            LedgerOutcome::Duplicate => "duplicate",
            LedgerOutcome::NotFoundNoop => "not_found_noop",
        }
    }
}

impl fmt::Display for LedgerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processed" => Ok(LedgerOutcome::Processed),
            "duplicate" => Ok(LedgerOutcome::Duplicate),
            "not_found_noop" => Ok(LedgerOutcome::NotFoundNoop),
            _ => Err(anyhow::anyhow!("Invalid ledger outcome: {}", s)),
        }
    }
}

/// Ledger row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProcessedEventRow {
    event_id: LikeEventId,
    event_type: String,
    post_id: PostId,
    user_id: UserId,
    status: String,
    processed_at: DateTime<Utc>,
}

/// Resolution of one like/unlike event, with or without a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedEvent {
    pub event_id: LikeEventId,
    pub kind: LikeEventKind,
    pub post_id: PostId,
    pub user_id: UserId,
    pub outcome: LedgerOutcome,
    pub processed_at: DateTime<Utc>,
}

impl TryFrom<ProcessedEventRow> for ProcessedEvent {
    type Error = anyhow::Error;

    fn try_from(row: ProcessedEventRow) -> Result<Self> {
        Ok(Self {
            event_id: row.event_id,
            kind: row.event_type.parse()?,
            post_id: row.post_id,
            user_id: row.user_id,
            outcome: row.status.parse()?,
            processed_at: row.processed_at,
        })
    }
}

/// Result of trying to write a ledger entry.
#[derive(Debug)]
pub enum LedgerInsert {
    Recorded(ProcessedEvent),
    /// Another attempt already holds this event id.
    AlreadyRecorded,
}

impl ProcessedEvent {
    pub async fn find_by_event_id<'e, E>(event_id: LikeEventId, executor: E) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, ProcessedEventRow>(
            "SELECT * FROM processed_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(executor)
        .await?;

        row.map(ProcessedEvent::try_from).transpose()
    }

    /// Insert a ledger entry.
    ///
    /// A duplicate event id comes back as [`LedgerInsert::AlreadyRecorded`],
    /// never as an error. In Postgres the failed statement still aborts the
    /// surrounding transaction; the caller must roll back.
    pub async fn insert<'e, E>(
        event_id: LikeEventId,
        kind: LikeEventKind,
        post_id: PostId,
        user_id: UserId,
        outcome: LedgerOutcome,
        executor: E,
    ) -> Result<LedgerInsert>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query_as::<_, ProcessedEventRow>(
            r#"
            INSERT INTO processed_events (event_id, event_type, post_id, user_id, status, processed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(kind.as_str())
        .bind(post_id)
        .bind(user_id)
        .bind(outcome.as_str())
        .fetch_one(executor)
        .await;

        match result {
            Ok(row) => Ok(LedgerInsert::Recorded(row.try_into()?)),
            Err(e) if is_unique_violation(&e, LEDGER_EVENT_ID_CONSTRAINT) => {
                Ok(LedgerInsert::AlreadyRecorded)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ledger entries for a pair, oldest first.
    pub async fn find_by_post_and_user(
        post_id: PostId,
        user_id: UserId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, ProcessedEventRow>(
            r#"
            SELECT * FROM processed_events
            WHERE post_id = $1 AND user_id = $2
            ORDER BY processed_at ASC
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(ProcessedEvent::try_from).collect()
    }

    /// `processed` likes minus `processed` unlikes for a post.
    pub async fn net_processed_likes(post_id: PostId, pool: &PgPool) -> Result<i64> {
        let net = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE event_type WHEN 'like' THEN 1 ELSE -1 END), 0)::BIGINT
            FROM processed_events
            WHERE post_id = $1 AND status = 'processed'
            "#,
        )
        .bind(post_id)
        .fetch_one(pool)
        .await?;
        Ok(net)
    }
}

/// Whether `error` is a unique violation of `constraint`.
pub fn is_unique_violation(error: &sqlx::Error, constraint: &str) -> bool {
    error
        .as_database_error()
        .map(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
        .unwrap_or(false)
}
