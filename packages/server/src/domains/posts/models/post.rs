use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{MediaFileId, Page, PostId, UserId};

/// A user's post.
///
/// `likes_count` is owned by the like reconciler and only moves through
/// [`Post::adjust_like_count`]; CRUD never writes it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub caption: String,
    pub media_file_id: Option<MediaFileId>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The complete set of fields a client may change on a post. The author,
/// the media attachment and the counters are fixed after creation.
///
/// `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePost {
    pub caption: Option<String>,
}

impl UpdatePost {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
    }
}

// =============================================================================
// Queries
// =============================================================================

impl Post {
    pub async fn find_by_id(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(post)
    }

    /// Newest first.
    pub async fn find_all(page: &Page, pool: &PgPool) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;
        Ok(posts)
    }

    pub async fn find_by_user_id(user_id: UserId, page: &Page, pool: &PgPool) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;
        Ok(posts)
    }

    pub async fn create(
        user_id: UserId,
        caption: &str,
        media_file_id: Option<MediaFileId>,
        pool: &PgPool,
    ) -> Result<Self> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, user_id, caption, media_file_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(PostId::new())
        .bind(user_id)
        .bind(caption)
        .bind(media_file_id)
        .fetch_one(pool)
        .await?;
        Ok(post)
    }

    /// Apply an [`UpdatePost`]. Returns `None` if the post does not exist.
    pub async fn update(id: PostId, changes: &UpdatePost, pool: &PgPool) -> Result<Option<Self>> {
        if changes.is_empty() {
            return Self::find_by_id(id, pool).await;
        }

        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET caption = COALESCE($2, caption),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.caption.as_deref())
        .fetch_optional(pool)
        .await?;
        Ok(post)
    }

    /// Hard delete. Likes cascade; ledger entries stay.
    pub async fn delete(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>("DELETE FROM posts WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(post)
    }

    /// Relative, store-atomic counter adjustment clamped at zero.
    ///
    /// Returns `None` when the post no longer exists. Inside a transaction the
    /// row stays locked until commit, so concurrent adjustments serialize.
    pub async fn adjust_like_count<'e, E>(id: PostId, delta: i32, executor: E) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET likes_count = GREATEST(likes_count + $2, 0),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;
        Ok(post)
    }
}
