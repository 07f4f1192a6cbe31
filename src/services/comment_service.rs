// CommentService - validation, threading, listing, counting and moderation of comments
// The only layer that encodes business rules; handlers translate HTTP to these calls

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        database::CommentStore, id_generator::CommentIdGenerator, viewer::ViewerContext,
    },
    models::{Comment, CommentId, ModerationOutcome, NewComment, PostCommentRequest, ANONYMOUS_AUTHOR},
    services::moderation::{ModerationDecision, ModerationPolicy},
};

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    ids: Arc<CommentIdGenerator>,
    moderation: Arc<dyn ModerationPolicy>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        ids: Arc<CommentIdGenerator>,
        moderation: Arc<dyn ModerationPolicy>,
    ) -> Self {
        Self {
            store,
            ids,
            moderation,
        }
    }

    /// Comments attached to `url` in insertion order, removed ones included.
    /// Without a url nothing is returned and the store is not consulted.
    pub async fn list_for_url(&self, url: Option<&str>) -> AppResult<Vec<Comment>> {
        match url {
            Some(url) if !url.is_empty() => self.store.comments_for_url(url).await,
            _ => Ok(Vec::new()),
        }
    }

    /// Validate and persist a comment. Posting needs no identity; the author
    /// is whatever the caller supplies, `"anonymous"` otherwise.
    pub async fn post_comment(&self, request: PostCommentRequest) -> AppResult<Comment> {
        let new_comment = validate(request)?;
        let id = self.ids.next_id();
        let created_at = chrono::Utc::now().timestamp_millis();

        let comment = self.store.insert_comment(id, &new_comment, created_at).await?;
        info!(
            id = %comment.id,
            url = %comment.url,
            reply = comment.parent_id.is_some(),
            "Comment posted"
        );
        Ok(comment)
    }

    /// Number of stored comments per url, removed ones included.
    pub async fn comment_counts(&self) -> AppResult<BTreeMap<String, u64>> {
        self.store.comment_counts().await
    }

    /// Soft-delete a comment on behalf of `viewer`. Authorization is decided
    /// before the id is looked at. Removing an already removed comment
    /// succeeds again; an id that never existed is `NotFound`.
    pub async fn moderate(&self, viewer: &ViewerContext, raw_id: &str) -> AppResult<ModerationOutcome> {
        if self.moderation.evaluate(viewer).await? == ModerationDecision::Deny {
            warn!(
                request_id = %viewer.request_id,
                email = viewer.email().unwrap_or("<anonymous>"),
                policy = self.moderation.name(),
                "Moderation denied"
            );
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }

        let id = CommentId::parse(raw_id).ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

        if !self.store.mark_removed(id).await? {
            return Err(AppError::NotFound("Not found".to_string()));
        }

        info!(
            request_id = %viewer.request_id,
            id = %id,
            moderator = viewer.email().unwrap_or_default(),
            "Comment soft-deleted"
        );
        Ok(ModerationOutcome::soft_deleted(id))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// `url` and `text` must be present and non-empty. An absent author becomes
/// `"anonymous"`; a supplied one is kept verbatim, even when empty. An empty
/// `parentId` means no parent.
fn validate(request: PostCommentRequest) -> AppResult<NewComment> {
    let (url, text) = match (non_empty(request.url), non_empty(request.text)) {
        (Some(url), Some(text)) => (url, text),
        _ => return Err(AppError::Validation("Missing fields".to_string())),
    };

    Ok(NewComment {
        url,
        text,
        author: request.author.unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
        parent_id: non_empty(request.parent_id),
    })
}
