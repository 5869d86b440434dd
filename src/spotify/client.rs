//! HTTP client for the Spotify Web API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::models::{
    ArtistObject, ArtistsResponse, AudioFeatures, AudioFeaturesResponse, Page, PlayHistoryItem,
    PlaylistEntry, PlaylistRef, TrackObject,
};
use super::{ApiError, MusicApi};
use crate::auth::SpotifyAuthClient;

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bearer-authenticated client for the Spotify Web API.
///
/// Cheap to construct; one instance lives for the duration of a single
/// ranking request and holds that request's access token.
pub struct SpotifyClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl SpotifyClient {
    pub fn new(client: Client, access_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Override the API base URL, for tests against a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", path_and_query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MusicApi for SpotifyClient {
    async fn playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistRef>, ApiError> {
        self.get_json(&format!("/me/playlists?limit={}&offset={}", limit, offset))
            .await
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<PlaylistEntry>, ApiError> {
        self.get_json(&format!(
            "/playlists/{}/tracks?limit={}&offset={}",
            urlencoding::encode(playlist_id),
            limit,
            offset
        ))
        .await
    }

    async fn top_tracks(&self, limit: u32) -> Result<Vec<TrackObject>, ApiError> {
        let page: Page<TrackObject> = self
            .get_json(&format!(
                "/me/top/tracks?time_range=short_term&limit={}",
                limit
            ))
            .await?;
        Ok(page.items)
    }

    async fn recently_played_page(
        &self,
        limit: u32,
        before_ms: Option<i64>,
    ) -> Result<Vec<PlayHistoryItem>, ApiError> {
        let query = match before_ms {
            Some(before) => format!("/me/player/recently-played?limit={}&before={}", limit, before),
            None => format!("/me/player/recently-played?limit={}", limit),
        };
        let page: Page<PlayHistoryItem> = self.get_json(&query).await?;
        Ok(page.items)
    }

    async fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: AudioFeaturesResponse = self
            .get_json(&format!("/audio-features?ids={}", ids.join(",")))
            .await?;
        Ok(response.audio_features)
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<ArtistObject>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: ArtistsResponse = self
            .get_json(&format!("/artists?ids={}", ids.join(",")))
            .await?;
        Ok(response.artists)
    }
}

/// Decorator around a bearer-authenticated API: a 403 from the batch
/// audio-features endpoint is retried once per batch with a
/// client-credentials app token. The token is fetched lazily and cached for
/// the lifetime of the instance, so a multi-chunk working set pays for it
/// once.
pub struct AppTokenFallback<A> {
    inner: A,
    auth: Arc<SpotifyAuthClient>,
    http: Client,
    cached_app_token: Mutex<Option<String>>,
}

impl<A: MusicApi> AppTokenFallback<A> {
    pub fn new(inner: A, auth: Arc<SpotifyAuthClient>, http: Client) -> Self {
        Self {
            inner,
            auth,
            http,
            cached_app_token: Mutex::new(None),
        }
    }

    async fn obtain_app_token(&self) -> Option<String> {
        let mut cached = self.cached_app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Some(token.clone());
        }
        match self.auth.app_token().await {
            Ok(token) => {
                *cached = Some(token.clone());
                Some(token)
            }
            Err(err) => {
                warn!("app token unavailable: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl<A: MusicApi> MusicApi for AppTokenFallback<A> {
    async fn playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistRef>, ApiError> {
        self.inner.playlists_page(limit, offset).await
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<PlaylistEntry>, ApiError> {
        self.inner.playlist_tracks_page(playlist_id, limit, offset).await
    }

    async fn top_tracks(&self, limit: u32) -> Result<Vec<TrackObject>, ApiError> {
        self.inner.top_tracks(limit).await
    }

    async fn recently_played_page(
        &self,
        limit: u32,
        before_ms: Option<i64>,
    ) -> Result<Vec<PlayHistoryItem>, ApiError> {
        self.inner.recently_played_page(limit, before_ms).await
    }

    async fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>, ApiError> {
        match self.inner.audio_features(ids).await {
            Err(ApiError::Status(403)) => {
                let Some(token) = self.obtain_app_token().await else {
                    return Err(ApiError::Status(403));
                };
                warn!("audio-features returned 403, retrying with app token");
                SpotifyClient::new(self.http.clone(), token)
                    .audio_features(ids)
                    .await
            }
            other => other,
        }
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<ArtistObject>, ApiError> {
        self.inner.artists(ids).await
    }
}
