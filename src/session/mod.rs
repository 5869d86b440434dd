//! In-memory session storage.
//!
//! Two keyed stores, both explicit service objects passed around by `Arc`
//! rather than ambient globals: [`SessionStore`] owns the token sessions
//! created after a successful callback, and [`PendingAuthStore`] holds the
//! PKCE state between /login and /callback.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// How long a login attempt may sit between /login and /callback.
const PENDING_AUTH_TTL_SECS: i64 = 300;

/// Default session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 3600;

fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Token bundle for one authenticated user, as returned by the token
/// endpoint. The core pipeline only ever reads `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token TTL in seconds, as reported by the token endpoint.
    pub expires_in: Option<i64>,
    /// Unix milliseconds when the tokens were obtained.
    pub obtained_at: Option<i64>,
}

struct SessionEntry {
    data: SessionData,
    created_at: i64,
}

/// Process-wide keyed session store.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Store a fresh session, returning its opaque id.
    pub async fn create(&self, data: SessionData) -> String {
        let id = random_token(32);
        let entry = SessionEntry {
            data,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.sessions.write().await.insert(id.clone(), entry);
        id
    }

    pub async fn get(&self, id: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id)?;
        let now = chrono::Utc::now().timestamp();
        if now - entry.created_at > self.ttl_secs {
            return None;
        }
        Some(entry.data.clone())
    }

    /// Replace the tokens of an existing session; no-op if it is gone.
    pub async fn update(&self, id: &str, data: SessionData) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(id) {
            entry.data = data;
        }
    }

    pub async fn delete(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Drop sessions past their TTL. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.created_at <= self.ttl_secs);
        before - sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS)
    }
}

/// State stored during the authorization flow (between /login and /callback).
#[derive(Debug, Clone)]
pub struct PendingAuth {
    /// PKCE code verifier, kept server-side only.
    pub pkce_verifier: String,
    pub created_at: i64,
}

/// Thread-safe storage for in-flight login attempts, keyed by the OAuth
/// `state` parameter.
pub struct PendingAuthStore {
    states: RwLock<HashMap<String, PendingAuth>>,
}

impl PendingAuthStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Store a pending attempt, returning the generated state key.
    pub async fn store(&self, pkce_verifier: String) -> String {
        let state = random_token(24);
        let pending = PendingAuth {
            pkce_verifier,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.states.write().await.insert(state.clone(), pending);
        state
    }

    /// Retrieve and remove a pending attempt, rejecting expired ones.
    pub async fn take(&self, state: &str) -> Option<PendingAuth> {
        let pending = self.states.write().await.remove(state)?;
        let now = chrono::Utc::now().timestamp();
        if now - pending.created_at > PENDING_AUTH_TTL_SECS {
            return None;
        }
        Some(pending)
    }

    /// Clean up attempts that never came back.
    pub async fn cleanup_expired(&self) {
        let now = chrono::Utc::now().timestamp();
        let mut states = self.states.write().await;
        states.retain(|_, pending| now - pending.created_at <= PENDING_AUTH_TTL_SECS);
    }
}

impl Default for PendingAuthStore {
    fn default() -> Self {
        Self::new()
    }
}
