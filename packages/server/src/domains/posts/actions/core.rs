//! Post CRUD actions.
//!
//! Writes commit first; the lifecycle event is published afterwards on a
//! best-effort basis, so a broker outage never undoes a committed change.

use thiserror::Error;
use tracing::info;

use crate::common::nats_tap::publish_best_effort;
use crate::common::{Page, PostId, UserId};
use crate::domains::posts::data::{CreatePostInput, UpdatePostInput, ValidationError};
use crate::domains::posts::events::PostEvent;
use crate::domains::posts::models::Post;
use crate::kernel::ServerDeps;

#[derive(Debug, Error)]
pub enum PostActionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Post not found: {0}")]
    NotFound(PostId),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub async fn create_post(input: CreatePostInput, deps: &ServerDeps) -> Result<Post, PostActionError> {
    input.validate()?;

    let post = Post::create(
        input.user_id,
        &input.caption,
        input.media_file_id,
        &deps.db_pool,
    )
    .await?;

    info!(post_id = %post.id, user_id = %post.user_id, "Post created");
    publish_best_effort(&PostEvent::created(&post), &*deps.nats).await;

    Ok(post)
}

pub async fn get_post(post_id: PostId, deps: &ServerDeps) -> Result<Post, PostActionError> {
    Post::find_by_id(post_id, &deps.db_pool)
        .await?
        .ok_or(PostActionError::NotFound(post_id))
}

pub async fn list_posts(page: &Page, deps: &ServerDeps) -> Result<Vec<Post>, PostActionError> {
    Ok(Post::find_all(page, &deps.db_pool).await?)
}

pub async fn list_user_posts(
    user_id: UserId,
    page: &Page,
    deps: &ServerDeps,
) -> Result<Vec<Post>, PostActionError> {
    Ok(Post::find_by_user_id(user_id, page, &deps.db_pool).await?)
}

pub async fn update_post(
    post_id: PostId,
    input: UpdatePostInput,
    deps: &ServerDeps,
) -> Result<Post, PostActionError> {
    let changes = input.into_update()?;
    let unchanged = changes.is_empty();

    let post = Post::update(post_id, &changes, &deps.db_pool)
        .await?
        .ok_or(PostActionError::NotFound(post_id))?;

    if !unchanged {
        info!(post_id = %post.id, "Post updated");
        publish_best_effort(&PostEvent::updated(&post), &*deps.nats).await;
    }

    Ok(post)
}

pub async fn delete_post(post_id: PostId, deps: &ServerDeps) -> Result<Post, PostActionError> {
    let post = Post::delete(post_id, &deps.db_pool)
        .await?
        .ok_or(PostActionError::NotFound(post_id))?;

    info!(post_id = %post.id, "Post deleted");
    publish_best_effort(&PostEvent::deleted(&post), &*deps.nats).await;

    Ok(post)
}
