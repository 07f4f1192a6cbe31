// ViewerContext Middleware - resolves the session cookie into a request-scoped viewer
// Handlers and services only ever see ViewerContext, never the session store

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::infrastructure::{
    session::{session_id_from_headers, SessionStore},
    viewer::ViewerContext,
};

/// Application state that owns the session store.
pub trait HasSessionStore {
    fn session_store(&self) -> &SessionStore;
}

/// Builds a `ViewerContext` for every request and injects it into the request
/// extensions. A missing, unknown, or expired session yields an anonymous
/// viewer; this never rejects a request.
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Response
where
    T: HasSessionStore + Clone + Send + Sync + 'static,
{
    let viewer_context = create_viewer_context(request.headers(), app_state.session_store());
    request.extensions_mut().insert(viewer_context);
    next.run(request).await
}

fn create_viewer_context(headers: &HeaderMap, sessions: &SessionStore) -> Arc<ViewerContext> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let identity = session_id_from_headers(headers).and_then(|id| sessions.identity(&id));

    let viewer_context = match identity {
        Some(identity) => {
            tracing::debug!(request_id = %request_id, email = identity.email(), "Authenticated viewer");
            ViewerContext::authenticated(request_id, identity)
        }
        None => ViewerContext::anonymous(request_id),
    };

    Arc::new(viewer_context)
}
