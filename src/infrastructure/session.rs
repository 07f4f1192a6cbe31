// Session Store - server-side browser sessions keyed by an opaque cookie value
// Holds the verified identity and any in-flight login handshake

use std::sync::Arc;

use axum::http::{header::COOKIE, HeaderMap};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;

use super::viewer::Identity;

pub const SESSION_COOKIE: &str = "comments_session";

/// Lifetime of a session that only carries an unfinished login.
pub const PENDING_LOGIN_TTL_SECS: i64 = 600;

/// Random URL-safe token with 256 bits of entropy. Used for session ids and
/// for the login `state` / `nonce` values.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Login handshake values remembered between `/login` and the callback.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
}

impl PendingLogin {
    pub fn generate() -> Self {
        Self {
            state: random_token(),
            nonce: random_token(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionData {
    pub identity: Option<Identity>,
    pub pending_login: Option<PendingLogin>,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, SessionData>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_secs.max(1)),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live session data; expired sessions are dropped and reported absent.
    pub fn get(&self, id: &SessionId) -> Option<SessionData> {
        let now = Utc::now();
        let data = self.sessions.get(id).map(|entry| entry.value().clone())?;
        if data.is_expired(now) {
            self.sessions.remove(id);
            return None;
        }
        Some(data)
    }

    pub fn identity(&self, id: &SessionId) -> Option<Identity> {
        self.get(id).and_then(|data| data.identity)
    }

    /// Record a login handshake, reusing the caller's live session when there
    /// is one. Returns the session id the browser must present on callback.
    /// A session created here lives only as long as a login may take.
    pub fn begin_login(&self, existing: Option<&SessionId>, pending: PendingLogin) -> SessionId {
        if let Some(id) = existing {
            if self.get(id).is_some() {
                if let Some(mut entry) = self.sessions.get_mut(id) {
                    entry.pending_login = Some(pending);
                    return id.clone();
                }
            }
        }

        let id = SessionId::generate();
        self.sessions.insert(
            id.clone(),
            SessionData {
                identity: None,
                pending_login: Some(pending),
                expires_at: Utc::now() + self.ttl.min(Duration::seconds(PENDING_LOGIN_TTL_SECS)),
            },
        );
        id
    }

    /// Remove and return the pending handshake so a callback can only be
    /// completed once.
    pub fn take_pending_login(&self, id: &SessionId) -> Option<PendingLogin> {
        self.get(id)?;
        self.sessions
            .get_mut(id)
            .and_then(|mut entry| entry.pending_login.take())
    }

    /// Bind a verified identity to a fresh session and retire the session the
    /// handshake ran on, so a pre-login session id is never authenticated.
    pub fn establish(&self, previous: Option<&SessionId>, identity: Identity) -> SessionId {
        if let Some(previous) = previous {
            self.sessions.remove(previous);
        }

        let id = SessionId::generate();
        self.sessions.insert(
            id.clone(),
            SessionData {
                identity: Some(identity),
                pending_login: None,
                expires_at: Utc::now() + self.ttl,
            },
        );
        id
    }

    pub fn destroy(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, data| !data.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    #[cfg(test)]
    fn force_expire(&self, id: &SessionId) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

/// Session id carried by the request's `Cookie` header(s), if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| SessionId(value.to_string()))
}

pub fn session_cookie(id: &SessionId, ttl_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        id.as_str(),
        ttl_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}
