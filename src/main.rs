// Article comments server

use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use article_comments::{api::create_router, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("article_comments=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(database = %config.database.url, "Opening comment store");

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Sweep expired sessions in the background
    let sessions = app_state.sessions.clone();
    let cleanup_interval = Duration::from_secs(config.session.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired sessions");
            }
        }
    });

    let app = create_router(app_state);

    // Start server
    let addr = config.server_address();
    info!("Article comments server starting on http://{}", addr);
    info!("  GET    /api/comments?url=<url>   - Comments for an article");
    info!("  POST   /api/comments             - Post a comment or reply");
    info!("  DELETE /api/comments/{{id}}        - Soft-delete a comment (moderators)");
    info!("  GET    /api/comment-counts       - Comment count per article");
    info!("  GET    /api/articles?page=<n>    - Article search");
    info!("  GET    /login | /authorize | /logout | /api/me");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
