//! Wire types for the Spotify Web API responses we consume.
//!
//! Upstream payloads are frequently missing fields (local tracks, podcast
//! episodes, markets without audio analysis), so almost everything here is
//! optional and gets filtered at the fetch layer.

use serde::Deserialize;

/// A page of a list endpoint: `{ items: [...], next: urlOrNull }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
    pub popularity: Option<u8>,
    pub duration_ms: Option<u64>,
    /// Entry type, `"track"` for playable tracks (playlists can also hold
    /// episodes and local files).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl TrackObject {
    /// Whether this entry is a regular playable track with an id.
    pub fn is_playable_track(&self) -> bool {
        self.id.is_some() && self.kind.as_deref().unwrap_or("track") == "track"
    }

    pub fn cover_image(&self) -> Option<String> {
        self.album
            .as_ref()
            .and_then(|a| a.images.first())
            .map(|i| i.url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistOwner {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub owner: Option<PlaylistOwner>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    pub track: Option<TrackObject>,
    /// RFC 3339 timestamp of the play.
    pub played_at: Option<String>,
}

impl PlayHistoryItem {
    /// Play timestamp in unix milliseconds, used as the `before` cursor for
    /// the next history page.
    pub fn played_at_ms(&self) -> Option<i64> {
        let raw = self.played_at.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

/// One row of the batch audio-features endpoint. The endpoint returns `null`
/// rows for tracks it has no analysis for, which is why consumers see
/// `Option<AudioFeatures>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioFeatures {
    pub id: Option<String>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub speechiness: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeaturesResponse {
    #[serde(default)]
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistsResponse {
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
}
