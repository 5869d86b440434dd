//! Spotify Web API access.
//!
//! The ranking pipeline talks to upstream through the [`MusicApi`] trait so
//! tests can substitute a stub; [`SpotifyClient`] is the real reqwest-backed
//! implementation, constructed per request around a bearer credential.

mod client;
pub mod models;

pub use client::{AppTokenFallback, SpotifyClient};

use async_trait::async_trait;
use thiserror::Error;

use models::{
    ArtistObject, AudioFeatures, Page, PlayHistoryItem, PlaylistEntry, PlaylistRef, TrackObject,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
}

/// Read-only view of the track/playlist/history/feature API consumed by the
/// ranking pipeline.
///
/// Pagination is explicit (limit/offset or a `before` cursor) so callers own
/// the page caps; implementations perform exactly one upstream call per
/// method invocation.
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// One page of the current user's playlists.
    async fn playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistRef>, ApiError>;

    /// One page of a playlist's entries.
    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<PlaylistEntry>, ApiError>;

    /// The user's short-term top tracks (single call, no pagination).
    async fn top_tracks(&self, limit: u32) -> Result<Vec<TrackObject>, ApiError>;

    /// One page of play history, optionally bounded by a `before` cursor in
    /// unix milliseconds.
    async fn recently_played_page(
        &self,
        limit: u32,
        before_ms: Option<i64>,
    ) -> Result<Vec<PlayHistoryItem>, ApiError>;

    /// Batch audio-features lookup; the result preserves per-id positions and
    /// may contain `None` rows for tracks without analysis.
    async fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>, ApiError>;

    /// Batch artist lookup, used for genre tags.
    async fn artists(&self, ids: &[String]) -> Result<Vec<ArtistObject>, ApiError>;
}
