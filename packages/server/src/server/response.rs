//! JSON envelope shared by every API route.
//!
//! Success: `{"success": true, "data": ...}` (plus `pagination` on lists).
//! Failure: `{"success": false, "error": "...", "details"?: "..."}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::common::PageInfo;
use crate::domains::likes::LikeRequestError;
use crate::domains::posts::PostActionError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            pagination: None,
        })
    }

    pub fn page(data: T, pagination: PageInfo) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            pagination: Some(pagination),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, details) = match &self {
            ApiError::Validation(details) => ("Validation error".to_string(), Some(details.clone())),
            ApiError::NotFound(message) => (message.clone(), None),
            ApiError::Unavailable(e) => {
                error!(error = %e, "dependency unavailable");
                ("Service unavailable".to_string(), None)
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "request failed");
                ("Internal server error".to_string(), None)
            }
        };

        let body = ErrorBody {
            success: false,
            error,
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PostActionError> for ApiError {
    fn from(error: PostActionError) -> Self {
        match error {
            PostActionError::Validation(e) => ApiError::Validation(e.to_string()),
            PostActionError::NotFound(_) => ApiError::NotFound("Post not found".to_string()),
            PostActionError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl From<LikeRequestError> for ApiError {
    fn from(error: LikeRequestError) -> Self {
        match error {
            LikeRequestError::PostNotFound(_) => ApiError::NotFound("Post not found".to_string()),
            LikeRequestError::Unavailable(e) => ApiError::Unavailable(e),
        }
    }
}
