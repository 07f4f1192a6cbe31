// Database Interface - persistence seam for comment records
// Each operation is a single statement against the backing store

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::AppResult;
use crate::models::{Comment, CommentId, NewComment};

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new record with `removed = false`. Either the whole record
    /// is written or nothing is.
    async fn insert_comment(
        &self,
        id: CommentId,
        comment: &NewComment,
        created_at: i64,
    ) -> AppResult<Comment>;

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>>;

    /// All records for `url` in insertion order, removed ones included.
    async fn comments_for_url(&self, url: &str) -> AppResult<Vec<Comment>>;

    /// Record count per url, removed ones included.
    async fn comment_counts(&self) -> AppResult<BTreeMap<String, u64>>;

    /// Highest id ever stored, used to resume id generation after a restart.
    async fn max_comment_id(&self) -> AppResult<Option<CommentId>>;

    /// Set the removed flag. Returns whether a record with `id` exists,
    /// regardless of whether it was already removed.
    async fn mark_removed(&self, id: CommentId) -> AppResult<bool>;
}
