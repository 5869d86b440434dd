//! Route handlers: the PKCE login round-trip, the snapshot query operation,
//! and the captioning endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::session::{Session, COOKIE_SESSION_KEY};
use super::state::ServerState;
use crate::auth;
use crate::caption::CaptionInput;
use crate::snapshot::{
    build_snapshot, FetchOptions, Mood, SnapshotOutcome, SnapshotParams, Source,
};
use crate::spotify::{AppTokenFallback, SpotifyClient};

const MAX_PLAYLIST_OFFSET: u32 = 2000;
const MAX_PLAYLIST_PAGE: u32 = 40;
const PLAYLIST_ID_LEN: usize = 22;

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub authenticated: bool,
}

pub async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        authenticated: session.is_some(),
    };
    Json(stats)
}

fn validation_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_request", "message": message.into() })),
    )
        .into_response()
}

// ---------- auth flow ----------

pub async fn login(State(state): State<ServerState>) -> Response {
    let verifier = auth::generate_verifier();
    let challenge = auth::challenge_from_verifier(&verifier);
    let oauth_state = state.pending_auth.store(verifier).await;
    let url = state.auth.authorize_url(&oauth_state, &challenge);
    Redirect::temporary(&url).into_response()
}

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn callback(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        warn!("authorization was denied upstream: {}", error);
        return validation_error(format!("authorization failed: {}", error));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return validation_error("missing code or state parameter");
    };

    let Some(pending) = state.pending_auth.take(&oauth_state).await else {
        return validation_error("unknown or expired authorization state");
    };

    let tokens = match state.auth.exchange_code(&code, &pending.pkce_verifier).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!("authorization code exchange failed: {}", err);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "token_exchange_failed" })),
            )
                .into_response();
        }
    };

    let session_id = state.sessions.create(tokens).await;
    info!("created session after successful token exchange");

    let cookie = Cookie::build((COOKIE_SESSION_KEY, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(state.config.session_ttl_secs))
        .build();

    (jar.add(cookie), Redirect::to("/")).into_response()
}

pub async fn logout(
    State(state): State<ServerState>,
    jar: CookieJar,
    session: Option<Session>,
) -> Response {
    if let Some(session) = session {
        state.sessions.delete(&session.id).await;
    }
    let jar = jar.remove(Cookie::build((COOKIE_SESSION_KEY, "")).path("/").build());
    (jar, Json(json!({ "ok": true }))).into_response()
}

// ---------- snapshot ----------

#[derive(Deserialize, Debug, Default)]
pub struct SnapshotQuery {
    pub mode: Option<String>,
    pub source: Option<String>,
    pub pl_offset: Option<u32>,
    pub pl_page: Option<u32>,
    pub playlist: Option<String>,
}

fn valid_playlist_id(id: &str) -> bool {
    id.len() == PLAYLIST_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Validate the string-enum query contract into typed pipeline parameters.
fn parse_snapshot_params(query: &SnapshotQuery) -> Result<SnapshotParams, String> {
    let mode = match &query.mode {
        Some(raw) => Some(raw.parse::<Mood>()?),
        None => None,
    };
    let source = match &query.source {
        Some(raw) => raw.parse::<Source>()?,
        None => Source::Auto,
    };

    let playlist_offset = query.pl_offset.unwrap_or(0);
    if playlist_offset > MAX_PLAYLIST_OFFSET {
        return Err(format!(
            "pl_offset must be at most {}",
            MAX_PLAYLIST_OFFSET
        ));
    }
    let playlist_page = query.pl_page.unwrap_or(0);
    if playlist_page > MAX_PLAYLIST_PAGE {
        return Err(format!("pl_page must be at most {}", MAX_PLAYLIST_PAGE));
    }

    let playlist_id = match &query.playlist {
        Some(id) if valid_playlist_id(id) => Some(id.clone()),
        Some(_) => return Err("playlist must be a 22-character base62 id".to_string()),
        None => None,
    };

    Ok(SnapshotParams {
        mode,
        source,
        fetch: FetchOptions {
            playlist_offset,
            playlist_track_offset: playlist_page * 100,
            playlist_id,
        },
    })
}

pub async fn snapshot(
    State(state): State<ServerState>,
    session: Session,
    Query(query): Query<SnapshotQuery>,
) -> Response {
    let params = match parse_snapshot_params(&query) {
        Ok(params) => params,
        Err(message) => return validation_error(message),
    };

    // Refresh the bearer if it is about to expire; the store keeps the
    // fresh tokens for subsequent requests.
    let mut tokens = session.tokens;
    if let Some(fresh) = state.auth.ensure_fresh(&tokens).await {
        state.sessions.update(&session.id, fresh.clone()).await;
        tokens = fresh;
    }

    // An app token can read audio features when the user token cannot.
    let api = AppTokenFallback::new(
        SpotifyClient::new(state.http.clone(), tokens.access_token),
        state.auth.clone(),
        state.http.clone(),
    );
    let outcome = build_snapshot(&api, &params, state.config.scoring_strategy).await;

    match outcome {
        SnapshotOutcome::Ready(snapshot) => Json(*snapshot).into_response(),
        SnapshotOutcome::NoTracks => Json(json!({
            "error": "no_tracks",
            "message": "Grant playlist-read-private and/or user-top-read; also ensure you have listening history.",
        }))
        .into_response(),
    }
}

// ---------- captioning ----------

pub async fn analyze(
    State(state): State<ServerState>,
    Json(input): Json<CaptionInput>,
) -> Response {
    let output = state.caption.generate(&input).await;
    Json(output).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(
            format_uptime(Duration::from_secs(90_061)),
            "1d 01:01:01"
        );
    }

    #[test]
    fn test_parse_defaults() {
        let params = parse_snapshot_params(&SnapshotQuery::default()).unwrap();
        assert!(params.mode.is_none());
        assert_eq!(params.source, Source::Auto);
        assert_eq!(params.fetch.playlist_offset, 0);
    }

    #[test]
    fn test_parse_valid_mode_and_source() {
        let query = SnapshotQuery {
            mode: Some("hype".to_string()),
            source: Some("repeat_derived".to_string()),
            ..Default::default()
        };
        let params = parse_snapshot_params(&query).unwrap();
        assert_eq!(params.mode, Some(Mood::Hype));
        assert_eq!(params.source, Source::RepeatDerived);
    }

    #[test]
    fn test_invalid_enum_values_are_rejected() {
        let query = SnapshotQuery {
            mode: Some("party".to_string()),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_err());

        let query = SnapshotQuery {
            source: Some("shuffle".to_string()),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_err());
    }

    #[test]
    fn test_offset_bounds() {
        let query = SnapshotQuery {
            pl_offset: Some(2001),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_err());

        let query = SnapshotQuery {
            pl_page: Some(41),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_err());
    }

    #[test]
    fn test_playlist_id_shape() {
        let good = "0123456789abcdefABCDEF";
        assert_eq!(good.len(), 22);
        let query = SnapshotQuery {
            playlist: Some(good.to_string()),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_ok());

        let query = SnapshotQuery {
            playlist: Some("not-a-playlist-id".to_string()),
            ..Default::default()
        };
        assert!(parse_snapshot_params(&query).is_err());
    }
}
