// Article Search Client - pass-through to the upstream article search API
// The API key stays server-side; the response body is returned untouched

use reqwest::Client;
use serde_json::Value;

use crate::config::ArticlesConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ArticleSearchClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    query: String,
}

impl ArticleSearchClient {
    pub fn from_config(config: &ArticlesConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            query: config.query.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch one page of results for the configured query.
    pub async fn search(&self, page: u32) -> AppResult<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Article search not configured".to_string()))?;

        let response = self
            .http
            .get(format!("{}/articlesearch.json", self.base_url))
            .query(&[
                ("q", self.query.as_str()),
                ("page", &page.to_string()),
                ("api-key", api_key),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch articles: {}", e);
                AppError::Upstream(format!("Failed to fetch articles: {}", e))
            })?;

        response.json::<Value>().await.map_err(|e| {
            tracing::error!("Failed to parse article search response: {}", e);
            AppError::Upstream(format!("Failed to parse article search response: {}", e))
        })
    }
}
