//! Application setup and router.

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    create_post_handler, delete_post_handler, get_post_handler, health_handler, like_event_handler,
    like_post_handler, like_status_handler, list_posts_handler, list_user_posts_handler,
    unlike_post_handler, update_post_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

fn api_routes() -> Router {
    Router::new()
        .route("/posts", post(create_post_handler).get(list_posts_handler))
        .route("/posts/user/:user_id", get(list_user_posts_handler))
        .route(
            "/posts/:post_id",
            get(get_post_handler)
                .put(update_post_handler)
                .delete(delete_post_handler),
        )
        .route("/posts/:post_id/like", post(like_post_handler))
        .route("/posts/:post_id/unlike", post(unlike_post_handler))
        .route("/posts/:post_id/likes/:user_id", get(like_status_handler))
        .route("/like-events/:event_id", get(like_event_handler))
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes())
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(AppState { deps }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
