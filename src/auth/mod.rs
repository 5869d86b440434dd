//! Spotify authorization: PKCE challenge generation, authorization-code
//! exchange, refresh, and the client-credentials app-token fallback.
//!
//! This is a public-client PKCE flow against the Spotify accounts service;
//! refresh uses the bare client id, no secret required.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionData;

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Scopes needed by the fetcher sources.
const SCOPES: &str = "user-top-read user-read-recently-played playlist-read-private";

/// Refresh this many seconds before the reported expiry.
const REFRESH_EARLY_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned status {0}")]
    Status(u16),
    #[error("app token requires a configured client secret")]
    MissingClientSecret,
}

/// Generate a PKCE code verifier (base64url of random bytes).
pub fn generate_verifier() -> String {
    let mut buf = [0u8; 64];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Derive the S256 code challenge for a verifier.
pub fn challenge_from_verifier(verifier: &str) -> String {
    let hashed = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hashed)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Client for the Spotify accounts service.
pub struct SpotifyAuthClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl SpotifyAuthClient {
    pub fn new(
        client: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: ACCOUNTS_BASE_URL.to_string(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Build the authorization URL the user is redirected to.
    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}&state={}&code_challenge_method=S256&code_challenge={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(SCOPES),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(format!("{}/api/token", self.base_url))
            .form(form)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<SessionData, AuthError> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
                ("client_id", &self.client_id),
                ("code_verifier", pkce_verifier),
            ])
            .await?;

        debug!("exchanged authorization code for tokens");
        Ok(SessionData {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            obtained_at: Some(chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Refresh an access token, keeping the old refresh token if the
    /// endpoint does not rotate it.
    pub async fn refresh(&self, tokens: &SessionData) -> Result<SessionData, AuthError> {
        let refresh_token = tokens.refresh_token.as_deref().unwrap_or_default();
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
            ])
            .await?;

        Ok(SessionData {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| tokens.refresh_token.clone()),
            expires_in: response.expires_in,
            obtained_at: Some(chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Refresh the tokens if they are at (or within 60s of) expiry.
    ///
    /// Best effort: no refresh token, still-fresh tokens, or a failed
    /// refresh all leave the session unchanged.
    pub async fn ensure_fresh(&self, tokens: &SessionData) -> Option<SessionData> {
        let now = chrono::Utc::now().timestamp_millis();
        let ttl_ms = tokens.expires_in.unwrap_or(3600) * 1000;
        let obtained = tokens.obtained_at.unwrap_or(now - ttl_ms + 1000);
        let expires = obtained + ttl_ms - REFRESH_EARLY_SECS * 1000;
        if now < expires {
            return None;
        }
        tokens.refresh_token.as_ref()?;

        match self.refresh(tokens).await {
            Ok(fresh) => Some(fresh),
            Err(err) => {
                warn!("token refresh failed, keeping stale token: {}", err);
                None
            }
        }
    }

    /// Client-credentials app token, used as a last resort when user-scoped
    /// calls come back 403.
    pub async fn app_token(&self) -> Result<String, AuthError> {
        let secret = self
            .client_secret
            .as_deref()
            .ok_or(AuthError::MissingClientSecret)?;

        let response = self
            .client
            .post(format!("{}/api/token", self.base_url))
            .basic_auth(&self.client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }
        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.access_token)
    }
}
