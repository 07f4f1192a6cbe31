use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::services::moderation::DEFAULT_MODERATOR_EMAIL;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub articles: ArticlesConfig,
    pub frontend: FrontendConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Node component embedded in generated comment ids (0..1024).
    pub id_node: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// OpenID-Connect client registration and moderator list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Expected `iss` claim; not checked when unset.
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub moderator_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlesConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub static_path: PathBuf,
    pub template_path: PathBuf,
    /// Where the browser lands after a successful login.
    pub app_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_secs: i64,
    pub secure_cookie: bool,
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Build a configuration from an arbitrary key lookup, falling back to
    /// defaults for anything missing or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            database: DatabaseConfig {
                url: var("DATABASE_URL", "sqlite:data/comments.db"),
                max_connections: var("DATABASE_MAX_CONNECTIONS", "5").parse().unwrap_or(5),
                id_node: var("ID_NODE", "0").parse().unwrap_or(0),
            },
            server: ServerConfig {
                host: var("SERVER_HOST", "0.0.0.0"),
                port: var("PORT", "8000").parse().unwrap_or(8000),
            },
            auth: AuthConfig {
                client_name: non_empty("OIDC_CLIENT_NAME"),
                client_id: non_empty("OIDC_CLIENT_ID"),
                client_secret: non_empty("OIDC_CLIENT_SECRET"),
                issuer: non_empty("OIDC_ISSUER"),
                authorization_endpoint: var(
                    "OIDC_AUTHORIZATION_ENDPOINT",
                    "http://localhost:5556/auth",
                ),
                token_endpoint: var("OIDC_TOKEN_ENDPOINT", "http://dex:5556/token"),
                jwks_uri: var("OIDC_JWKS_URI", "http://dex:5556/keys"),
                redirect_uri: var("OIDC_REDIRECT_URI", "http://localhost:8000/authorize"),
                scopes: var("OIDC_SCOPES", "openid email profile"),
                moderator_emails: parse_list(&var("MODERATOR_EMAILS", DEFAULT_MODERATOR_EMAIL)),
            },
            articles: ArticlesConfig {
                api_key: non_empty("NYT_API_KEY"),
                base_url: var(
                    "ARTICLES_BASE_URL",
                    "https://api.nytimes.com/svc/search/v2",
                ),
                query: var("ARTICLES_QUERY", "Davis OR Sacramento"),
            },
            frontend: FrontendConfig {
                static_path: PathBuf::from(var("STATIC_PATH", "static")),
                template_path: PathBuf::from(var("TEMPLATE_PATH", "templates")),
                app_url: var("FRONTEND_URL", "http://localhost:5173/"),
            },
            session: SessionConfig {
                ttl_secs: var("SESSION_TTL_SECS", "86400").parse().unwrap_or(86400),
                secure_cookie: var("SESSION_COOKIE_SECURE", "false")
                    .parse()
                    .unwrap_or(false),
                cleanup_interval_secs: var("SESSION_CLEANUP_INTERVAL_SECS", "300")
                    .parse()
                    .unwrap_or(300),
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
