use axum::extract::FromRef;
use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{
        middleware::HasSessionStore, ArticleSearchClient, CommentIdGenerator, CommentStore,
        OidcClient, SessionStore, SqliteCommentStore,
    },
    services::{CommentService, ModeratorEmailPolicy},
};

#[derive(Clone)]
pub struct AppState {
    pub comments: CommentService,
    pub sessions: SessionStore,
    /// `None` when no client credentials are configured; login is then unavailable.
    pub oidc: Option<OidcClient>,
    pub articles: ArticleSearchClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = SqliteCommentStore::connect(
            &config.database.url,
            config.database.max_connections,
        )
        .await?;
        Ok(Self::with_store(config, Arc::new(store)).await?)
    }

    /// Wire the services around an already opened comment store.
    pub async fn with_store(config: Config, store: Arc<dyn CommentStore>) -> AppResult<Self> {
        let ids = Arc::new(CommentIdGenerator::new(config.database.id_node)?);
        if let Some(highest) = store.max_comment_id().await? {
            ids.resume_after(highest);
            tracing::debug!(highest = %highest, "Resuming comment ids");
        }
        let moderation = Arc::new(ModeratorEmailPolicy::new(
            config.auth.moderator_emails.iter().cloned(),
        ));
        let oidc = OidcClient::from_config(&config.auth);
        if oidc.is_none() {
            tracing::warn!("OIDC client credentials not configured; /login is disabled");
        }

        Ok(Self {
            comments: CommentService::new(store, ids, moderation),
            sessions: SessionStore::new(config.session.ttl_secs),
            oidc,
            articles: ArticleSearchClient::from_config(&config.articles),
            config: Arc::new(config),
        })
    }
}

impl HasSessionStore for AppState {
    fn session_store(&self) -> &SessionStore {
        &self.sessions
    }
}

impl FromRef<AppState> for CommentService {
    fn from_ref(state: &AppState) -> Self {
        state.comments.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for ArticleSearchClient {
    fn from_ref(state: &AppState) -> Self {
        state.articles.clone()
    }
}
