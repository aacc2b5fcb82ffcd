use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    http::StatusCode,
    Json,
};

use crate::common::{LikeEventId, PostId, UserId};
use crate::domains::likes::actions;
use crate::domains::likes::{AcceptedLikeData, LikeRequestInput, LikeStatusData, ProcessedEvent};
use crate::server::app::AppState;
use crate::server::response::{ApiError, ApiResponse};

type Accepted = (StatusCode, Json<ApiResponse<AcceptedLikeData>>);

pub async fn like_post_handler(
    Extension(state): Extension<AppState>,
    post_id: Result<Path<PostId>, PathRejection>,
    payload: Result<Json<LikeRequestInput>, JsonRejection>,
) -> Result<Accepted, ApiError> {
    let Path(post_id) = post_id?;
    let Json(input) = payload?;
    let accepted = actions::request_like(post_id, input.user_id, &state.deps).await?;
    Ok((StatusCode::ACCEPTED, ApiResponse::ok(accepted)))
}

pub async fn unlike_post_handler(
    Extension(state): Extension<AppState>,
    post_id: Result<Path<PostId>, PathRejection>,
    payload: Result<Json<LikeRequestInput>, JsonRejection>,
) -> Result<Accepted, ApiError> {
    let Path(post_id) = post_id?;
    let Json(input) = payload?;
    let accepted = actions::request_unlike(post_id, input.user_id, &state.deps).await?;
    Ok((StatusCode::ACCEPTED, ApiResponse::ok(accepted)))
}

pub async fn like_status_handler(
    Extension(state): Extension<AppState>,
    ids: Result<Path<(PostId, UserId)>, PathRejection>,
) -> Result<Json<ApiResponse<LikeStatusData>>, ApiError> {
    let Path((post_id, user_id)) = ids?;
    let status = actions::like_status(post_id, user_id, &state.deps).await?;
    Ok(ApiResponse::ok(status))
}

/// Ledger entry for an accepted event; 404 until the reconciler has run.
pub async fn like_event_handler(
    Extension(state): Extension<AppState>,
    event_id: Result<Path<LikeEventId>, PathRejection>,
) -> Result<Json<ApiResponse<ProcessedEvent>>, ApiError> {
    let Path(event_id) = event_id?;
    actions::find_event_outcome(event_id, &state.deps)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::NotFound("Like event not processed yet".to_string()))
}
