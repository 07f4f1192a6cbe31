use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{error::AppResult, infrastructure::ArticleSearchClient};

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub page: Option<String>,
}

impl ArticlesQuery {
    /// Requested page; absent or non-numeric values mean the first page.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|page| page.trim().parse().ok())
            .unwrap_or(0)
    }
}

pub async fn search_articles_handler(
    State(articles): State<ArticleSearchClient>,
    Query(query): Query<ArticlesQuery>,
) -> AppResult<Json<Value>> {
    Ok(Json(articles.search(query.page()).await?))
}
