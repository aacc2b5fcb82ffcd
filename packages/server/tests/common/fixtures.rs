//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.

use post_service_core::common::{PostId, UserId};
use post_service_core::domains::likes::events::{LikeEnvelope, LikeEventKind};
use post_service_core::domains::posts::models::Post;
use sqlx::PgPool;

use super::TEST_PARTITIONS;

/// Create a post by a fresh author.
pub async fn create_test_post(pool: &PgPool) -> Post {
    Post::create(UserId::new(), "Sunset over the lake", None, pool)
        .await
        .expect("Failed to create test post")
}

pub fn like(post_id: PostId, user_id: UserId) -> LikeEnvelope {
    LikeEnvelope::new(LikeEventKind::Like, post_id, user_id, TEST_PARTITIONS)
}

pub fn unlike(post_id: PostId, user_id: UserId) -> LikeEnvelope {
    LikeEnvelope::new(LikeEventKind::Unlike, post_id, user_id, TEST_PARTITIONS)
}

/// Current `likes_count`, or `None` if the post is gone.
pub async fn likes_count(post_id: PostId, pool: &PgPool) -> Option<i32> {
    Post::find_by_id(post_id, pool)
        .await
        .expect("Failed to read post")
        .map(|post| post.likes_count)
}
