// Login handlers - OpenID-Connect redirect, callback, logout and identity lookup

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::{
        middleware::Vc,
        oidc::OidcClient,
        session::{clear_session_cookie, session_cookie, session_id_from_headers, PendingLogin},
        viewer::Identity,
    },
};

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn oidc_client(state: &AppState) -> AppResult<&OidcClient> {
    state
        .oidc
        .as_ref()
        .ok_or_else(|| AppError::ConfigurationError("Login is not configured".to_string()))
}

/// `GET /login`: remember a fresh state/nonce in the session and send the
/// browser to the provider.
pub async fn login_handler(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let oidc = oidc_client(&state)?;
    let pending = PendingLogin::generate();
    let location = oidc.authorization_url(&pending);

    let existing = session_id_from_headers(&headers);
    let session_id = state.sessions.begin_login(existing.as_ref(), pending);
    let cookie = session_cookie(
        &session_id,
        state.sessions.ttl_secs(),
        state.config.session.secure_cookie,
    );

    tracing::debug!(provider = oidc.name(), "Redirecting to identity provider");
    Ok(([(SET_COOKIE, cookie)], Redirect::to(&location)).into_response())
}

/// `GET /authorize`: provider callback. The returned `state` must match the
/// one stored by `/login`, and the handshake is consumed either way.
pub async fn authorize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuthorizeQuery>,
) -> AppResult<Response> {
    let oidc = oidc_client(&state)?;

    if let Some(error) = query.error {
        return Err(AppError::Authentication(format!(
            "Identity provider returned {}: {}",
            error,
            query.error_description.unwrap_or_default()
        )));
    }

    let session_id = session_id_from_headers(&headers)
        .ok_or_else(|| AppError::Authentication("No login in progress".to_string()))?;
    let pending = state
        .sessions
        .take_pending_login(&session_id)
        .ok_or_else(|| AppError::Authentication("No login in progress".to_string()))?;

    if query.state.as_deref() != Some(pending.state.as_str()) {
        return Err(AppError::Authentication("State mismatch".to_string()));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::Authentication("Missing authorization code".to_string()))?;

    let identity = oidc.exchange_code(&code, &pending.nonce).await?;
    tracing::info!(email = identity.email(), "User logged in");

    let session_id = state.sessions.establish(Some(&session_id), identity);
    let cookie = session_cookie(
        &session_id,
        state.sessions.ttl_secs(),
        state.config.session.secure_cookie,
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Redirect::to(&state.config.frontend.app_url),
    )
        .into_response())
}

/// `GET /logout`: forget the session and go home.
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        if state.sessions.destroy(&session_id) {
            tracing::info!("User logged out");
        }
    }

    ([(SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response()
}

/// `GET /api/me`: claims of the logged-in user, `401 {}` otherwise.
pub async fn me_handler(vc: Vc) -> AppResult<Json<Identity>> {
    vc.identity()
        .cloned()
        .map(Json)
        .ok_or(AppError::Unauthorized)
}
