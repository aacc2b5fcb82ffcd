use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    Json,
};

use crate::common::{PageInfo, PageParams, PostId, UserId};
use crate::domains::posts::actions;
use crate::domains::posts::{CreatePostInput, Post, UpdatePostInput};
use crate::server::app::AppState;
use crate::server::response::{ApiError, ApiResponse};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub async fn create_post_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreatePostInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let Json(input) = payload?;
    let post = actions::create_post(input, &state.deps).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(post)))
}

pub async fn list_posts_handler(
    Extension(state): Extension<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Vec<Post>> {
    let Query(params) = params?;
    let page = params.validate();
    let posts = actions::list_posts(&page, &state.deps).await?;
    let pagination = PageInfo::new(page, posts.len());
    Ok(ApiResponse::page(posts, pagination))
}

pub async fn get_post_handler(
    Extension(state): Extension<AppState>,
    post_id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<Post> {
    let Path(post_id) = post_id?;
    let post = actions::get_post(post_id, &state.deps).await?;
    Ok(ApiResponse::ok(post))
}

pub async fn list_user_posts_handler(
    Extension(state): Extension<AppState>,
    user_id: Result<Path<UserId>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Vec<Post>> {
    let Path(user_id) = user_id?;
    let Query(params) = params?;
    let page = params.validate();
    let posts = actions::list_user_posts(user_id, &page, &state.deps).await?;
    let pagination = PageInfo::new(page, posts.len());
    Ok(ApiResponse::page(posts, pagination))
}

pub async fn update_post_handler(
    Extension(state): Extension<AppState>,
    post_id: Result<Path<PostId>, PathRejection>,
    payload: Result<Json<UpdatePostInput>, JsonRejection>,
) -> ApiResult<Post> {
    let Path(post_id) = post_id?;
    let Json(input) = payload?;
    let post = actions::update_post(post_id, input, &state.deps).await?;
    Ok(ApiResponse::ok(post))
}

pub async fn delete_post_handler(
    Extension(state): Extension<AppState>,
    post_id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<Post> {
    let Path(post_id) = post_id?;
    let post = actions::delete_post(post_id, &state.deps).await?;
    Ok(ApiResponse::ok(post))
}
