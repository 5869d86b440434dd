use super::state::ServerState;
use crate::session::SessionData;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use tracing::debug;

pub const COOKIE_SESSION_KEY: &str = "snapmood_session";
pub const HEADER_SESSION_KEY: &str = "Authorization";

/// An authenticated request's session: the store key plus the token bundle
/// as of extraction time.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub tokens: SessionData,
}

pub enum SessionExtractionError {
    Unauthorized,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
        }
    }
}

async fn extract_session_id_from_cookies(parts: &mut Parts, ctx: &ServerState) -> Option<String> {
    CookieJar::from_request_parts(parts, ctx)
        .await
        .expect("Could not read cookies into CookieJar.")
        .get(COOKIE_SESSION_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_session_id_from_headers(parts: &mut Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw).to_string())
}

async fn extract_session_from_request_parts(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<Session> {
    let id = match extract_session_id_from_cookies(parts, ctx)
        .await
        .or_else(|| extract_session_id_from_headers(parts))
    {
        None => {
            debug!("no session id in cookies nor headers");
            return None;
        }
        Some(id) => id,
    };

    match ctx.sessions.get(&id).await {
        Some(tokens) => Some(Session { id, tokens }),
        None => {
            debug!("session id not found or expired");
            None
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .await
            .ok_or(SessionExtractionError::Unauthorized)
    }
}

impl FromRequestParts<ServerState> for Option<Session> {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx).await)
    }
}
