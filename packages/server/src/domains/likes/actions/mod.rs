//! Like gateway actions.
//!
//! Accepting a like only checks the post exists and publishes the intent.
//! The relationship and counter change later, in the reconciler.

use anyhow::Result;
use thiserror::Error;

use crate::common::{LikeEventId, PostId, UserId};
use crate::domains::likes::data::{AcceptedLikeData, LikeStatusData};
use crate::domains::likes::effects::LikeEventProducer;
use crate::domains::likes::events::LikeEventKind;
use crate::domains::likes::models::{PostLike, ProcessedEvent};
use crate::domains::posts::models::Post;
use crate::kernel::ServerDeps;

#[derive(Debug, Error)]
pub enum LikeRequestError {
    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    /// Store or broker could not take the request; nothing was published.
    #[error("Like service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub async fn request_like(
    post_id: PostId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<AcceptedLikeData, LikeRequestError> {
    request(LikeEventKind::Like, post_id, user_id, deps).await
}

pub async fn request_unlike(
    post_id: PostId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<AcceptedLikeData, LikeRequestError> {
    request(LikeEventKind::Unlike, post_id, user_id, deps).await
}

async fn request(
    kind: LikeEventKind,
    post_id: PostId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<AcceptedLikeData, LikeRequestError> {
    let exists = Post::find_by_id(post_id, &deps.db_pool)
        .await
        .map_err(LikeRequestError::Unavailable)?
        .is_some();
    if !exists {
        return Err(LikeRequestError::PostNotFound(post_id));
    }

    let envelope = LikeEventProducer::from_deps(deps)
        .publish(kind, post_id, user_id)
        .await
        .map_err(LikeRequestError::Unavailable)?;

    Ok(AcceptedLikeData {
        event_id: envelope.event_id,
        kind,
        post_id,
        user_id,
        status: "accepted",
    })
}

/// Whether the pair is liked right now, as far as the reconciler has got.
pub async fn like_status(post_id: PostId, user_id: UserId, deps: &ServerDeps) -> Result<LikeStatusData> {
    let liked = PostLike::find(post_id, user_id, &deps.db_pool).await?.is_some();
    Ok(LikeStatusData {
        post_id,
        user_id,
        liked,
    })
}

/// Ledger entry for an accepted event, `None` until it has been applied.
pub async fn find_event_outcome(event_id: LikeEventId, deps: &ServerDeps) -> Result<Option<ProcessedEvent>> {
    ProcessedEvent::find_by_event_id(event_id, &deps.db_pool).await
}
