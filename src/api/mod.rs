// HTTP layer - routes, middleware stack and static frontend

pub mod articles;
pub mod auth;
pub mod comments;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{app_state::AppState, infrastructure::middleware::viewer_context_middleware};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Build the application router.
///
/// Every request passes through `viewer_context_middleware`, so handlers can
/// extract a `Vc`. Paths that match no route are served from the static
/// directory, falling back to the template `index.html`.
pub fn create_router(state: AppState) -> Router {
    let frontend = &state.config.frontend;
    let static_files = ServeDir::new(&frontend.static_path)
        .fallback(ServeFile::new(frontend.template_path.join("index.html")));

    Router::new()
        // Comments
        .route(
            "/api/comments",
            get(comments::list_comments_handler).post(comments::post_comment_handler),
        )
        .route("/api/comments/{id}", delete(comments::delete_comment_handler))
        .route("/api/comment-counts", get(comments::comment_counts_handler))
        // Identity
        .route("/api/me", get(auth::me_handler))
        .route("/login", get(auth::login_handler))
        .route("/authorize", get(auth::authorize_handler))
        .route("/logout", get(auth::logout_handler))
        // Articles
        .route("/api/articles", get(articles::search_articles_handler))
        .route("/health", get(health_check))
        .fallback_service(static_files)
        .layer(from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
