use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::CommentStore;
use crate::models::{Comment, CommentId, CommentState, NewComment, ANONYMOUS_AUTHOR};

/// SQLite implementation of the comment store
pub struct SqliteCommentStore {
    pool: SqlitePool,
}

impl SqliteCommentStore {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite:data/comments.db`.
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL {}: {}", url, e)))?
            .create_if_missing(true);

        if let Some(parent) = database_file(url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::DatabaseError(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Private in-memory database. The pool is pinned to one connection that
    /// is never recycled, since every SQLite memory connection is its own
    /// database.
    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create the comments table and its url index if missing.
    /// `author` and `removed` are nullable so rows written without them
    /// read back with defaults.
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                author TEXT,
                text TEXT NOT NULL,
                parent_id TEXT,
                removed INTEGER DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_url ON comments(url, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create comments url index: {}", e))
            })?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Filesystem path named by a `sqlite:` url, if it names one.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn comment_from_row(row: &SqliteRow) -> AppResult<Comment> {
    let author: Option<String> = row.try_get("author")?;
    let removed: Option<bool> = row.try_get("removed")?;

    Ok(Comment {
        id: CommentId::new(row.try_get("id")?),
        url: row.try_get("url")?,
        author: author.unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
        text: row.try_get("text")?,
        state: CommentState::from_removed_flag(removed),
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CommentStore for SqliteCommentStore {
    async fn insert_comment(
        &self,
        id: CommentId,
        comment: &NewComment,
        created_at: i64,
    ) -> AppResult<Comment> {
        sqlx::query(
            "INSERT INTO comments (id, url, author, text, parent_id, removed, created_at) VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(id.value())
        .bind(&comment.url)
        .bind(&comment.author)
        .bind(&comment.text)
        .bind(&comment.parent_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert comment {}: {}", id, e)))?;

        Ok(Comment {
            id,
            url: comment.url.clone(),
            author: comment.author.clone(),
            text: comment.text.clone(),
            state: CommentState::Active,
            parent_id: comment.parent_id.clone(),
            created_at,
        })
    }

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, url, author, text, parent_id, removed, created_at FROM comments WHERE id = ?",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get comment {}: {}", id, e)))?;

        row.as_ref().map(comment_from_row).transpose()
    }

    async fn comments_for_url(&self, url: &str) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, url, author, text, parent_id, removed, created_at FROM comments WHERE url = ? ORDER BY id",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list comments: {}", e)))?;

        rows.iter().map(comment_from_row).collect()
    }

    async fn comment_counts(&self) -> AppResult<BTreeMap<String, u64>> {
        let rows = sqlx::query("SELECT url, COUNT(*) AS total FROM comments GROUP BY url")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count comments: {}", e)))?;

        rows.iter()
            .map(|row| -> AppResult<(String, u64)> {
                let url: String = row.try_get("url")?;
                let total: i64 = row.try_get("total")?;
                Ok((url, total as u64))
            })
            .collect()
    }

    async fn max_comment_id(&self) -> AppResult<Option<CommentId>> {
        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM comments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read highest comment id: {}", e)))?;

        Ok(max_id.map(CommentId::new))
    }

    async fn mark_removed(&self, id: CommentId) -> AppResult<bool> {
        // SQLite reports every row matched by the WHERE clause, changed or not.
        let result = sqlx::query("UPDATE comments SET removed = 1 WHERE id = ?")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to remove comment {}: {}", id, e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_comment(url: &str, text: &str, parent_id: Option<&str>) -> NewComment {
        NewComment {
            url: url.to_string(),
            author: ANONYMOUS_AUTHOR.to_string(),
            text: text.to_string(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        db.insert_comment(CommentId::new(20), &new_comment("a", "second", None), 2)
            .await
            .unwrap();
        db.insert_comment(CommentId::new(10), &new_comment("a", "first", None), 1)
            .await
            .unwrap();
        db.insert_comment(CommentId::new(30), &new_comment("b", "other", None), 3)
            .await
            .unwrap();

        let comments = db.comments_for_url("a").await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(db.comments_for_url("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        db.insert_comment(CommentId::new(1), &new_comment("a", "x", None), 1)
            .await
            .unwrap();
        let result = db
            .insert_comment(CommentId::new(1), &new_comment("a", "y", None), 2)
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
        assert_eq!(db.comments_for_url("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_removed_reports_existence() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        db.insert_comment(CommentId::new(5), &new_comment("a", "x", Some("4")), 1)
            .await
            .unwrap();

        assert!(db.mark_removed(CommentId::new(5)).await.unwrap());
        assert!(db.mark_removed(CommentId::new(5)).await.unwrap());
        assert!(!db.mark_removed(CommentId::new(6)).await.unwrap());

        let stored = db.get_comment(CommentId::new(5)).await.unwrap().unwrap();
        assert!(stored.state.is_removed());
        assert_eq!(stored.parent_id.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_counts_include_removed() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        for (id, url) in [(1, "a"), (2, "a"), (3, "b")] {
            db.insert_comment(CommentId::new(id), &new_comment(url, "x", None), id)
                .await
                .unwrap();
        }
        db.mark_removed(CommentId::new(1)).await.unwrap();

        let counts = db.comment_counts().await.unwrap();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn test_max_comment_id() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        assert_eq!(db.max_comment_id().await.unwrap(), None);

        for id in [4, 11, 7] {
            db.insert_comment(CommentId::new(id), &new_comment("a", "x", None), id)
                .await
                .unwrap();
        }
        assert_eq!(db.max_comment_id().await.unwrap(), Some(CommentId::new(11)));
    }

    #[tokio::test]
    async fn test_empty_author_is_kept() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        let comment = NewComment {
            author: String::new(),
            ..new_comment("a", "x", None)
        };
        db.insert_comment(CommentId::new(1), &comment, 1).await.unwrap();
        assert_eq!(db.comments_for_url("a").await.unwrap()[0].author, "");
    }

    #[tokio::test]
    async fn test_rows_without_author_or_flag_read_with_defaults() {
        let db = SqliteCommentStore::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO comments (id, url, author, text, parent_id, removed, created_at) VALUES (9, 'a', NULL, 'legacy', NULL, NULL, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let comment = db.get_comment(CommentId::new(9)).await.unwrap().unwrap();
        assert_eq!(comment.author, ANONYMOUS_AUTHOR);
        assert_eq!(comment.state, CommentState::Active);
        assert!(comment.is_root());
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file("sqlite:data/comments.db"),
            Some(PathBuf::from("data/comments.db"))
        );
        assert_eq!(
            database_file("sqlite:///var/lib/comments.db?mode=rwc"),
            Some(PathBuf::from("/var/lib/comments.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/comments.db").display());

        {
            let db = SqliteCommentStore::connect(&url, 2).await.unwrap();
            db.insert_comment(CommentId::new(1), &new_comment("a", "kept", None), 1)
                .await
                .unwrap();
        }

        let db = SqliteCommentStore::connect(&url, 2).await.unwrap();
        let comments = db.comments_for_url("a").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "kept");
    }
}
