// Comment handlers - HTTP translation for the comment service

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    infrastructure::middleware::Vc,
    models::{Comment, ModerationOutcome, PostCommentRequest},
    services::CommentService,
};

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub url: Option<String>,
}

pub async fn list_comments_handler(
    State(comments): State<CommentService>,
    Query(query): Query<CommentsQuery>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = comments.list_for_url(query.url.as_deref()).await?;
    Ok(Json(comments))
}

pub async fn post_comment_handler(
    State(comments): State<CommentService>,
    payload: Result<Json<PostCommentRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected comment body: {}", rejection.body_text());
        AppError::Validation("Invalid JSON body".to_string())
    })?;

    comments.post_comment(request).await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn comment_counts_handler(
    State(comments): State<CommentService>,
) -> AppResult<Json<BTreeMap<String, u64>>> {
    Ok(Json(comments.comment_counts().await?))
}

pub async fn delete_comment_handler(
    State(comments): State<CommentService>,
    vc: Vc,
    Path(id): Path<String>,
) -> AppResult<Json<ModerationOutcome>> {
    let outcome = comments.moderate(&vc, &id).await?;
    Ok(Json(outcome))
}
