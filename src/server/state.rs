use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::SpotifyAuthClient;
use crate::caption::CaptionClient;
use crate::config::AppConfig;
use crate::session::{PendingAuthStore, SessionStore};

pub type GuardedSessionStore = Arc<SessionStore>;
pub type GuardedPendingAuthStore = Arc<PendingAuthStore>;
pub type GuardedAuthClient = Arc<SpotifyAuthClient>;
pub type GuardedCaptionClient = Arc<CaptionClient>;

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
    /// Shared connection pool for all upstream calls.
    pub http: reqwest::Client,
    pub sessions: GuardedSessionStore,
    pub pending_auth: GuardedPendingAuthStore,
    pub auth: GuardedAuthClient,
    pub caption: GuardedCaptionClient,
}

impl FromRef<ServerState> for GuardedSessionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}

impl FromRef<ServerState> for GuardedPendingAuthStore {
    fn from_ref(input: &ServerState) -> Self {
        input.pending_auth.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthClient {
    fn from_ref(input: &ServerState) -> Self {
        input.auth.clone()
    }
}

impl FromRef<ServerState> for GuardedCaptionClient {
    fn from_ref(input: &ServerState) -> Self {
        input.caption.clone()
    }
}
