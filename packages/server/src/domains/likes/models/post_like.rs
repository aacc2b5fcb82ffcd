use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{PostId, PostLikeId, UserId};

/// Unique (post_id, user_id): one like per pair.
pub const POST_LIKE_PAIR_CONSTRAINT: &str = "post_likes_post_user_key";

/// "User X currently likes post Y". Existence of the row is the truth;
/// `posts.likes_count` follows it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostLike {
    pub id: PostLikeId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl PostLike {
    pub async fn find(post_id: PostId, user_id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        let like = sqlx::query_as::<_, PostLike>(
            "SELECT * FROM post_likes WHERE post_id = $1 AND user_id = $2",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(like)
    }

    /// Look up the pair and lock the row until the transaction ends.
    ///
    /// A concurrent unlike of the same pair waits here and then sees the row
    /// gone instead of deleting it a second time.
    pub async fn find_for_update<'e, E>(post_id: PostId, user_id: UserId, executor: E) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let like = sqlx::query_as::<_, PostLike>(
            "SELECT * FROM post_likes WHERE post_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(like)
    }

    /// Insert the pair. A concurrent insert of the same pair surfaces as a
    /// unique violation on [`POST_LIKE_PAIR_CONSTRAINT`].
    pub async fn insert<'e, E>(
        post_id: PostId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        executor: E,
    ) -> std::result::Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, PostLike>(
            r#"
            INSERT INTO post_likes (id, post_id, user_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(PostLikeId::new())
        .bind(post_id)
        .bind(user_id)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(post_id: PostId, user_id: UserId, executor: E) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let like = sqlx::query_as::<_, PostLike>(
            "DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(like)
    }

    pub async fn count_by_post(post_id: PostId, pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
