//! Working-set acquisition with ordered source fallback.
//!
//! Every paginated call is bounded by an explicit page cap, and an upstream
//! failure mid-pagination truncates to whatever was accumulated instead of
//! surfacing an error. An empty result is a normal outcome here; the caller
//! decides whether to fall back to the next source.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::scoring::PlaySignals;
use crate::spotify::models::{PlayHistoryItem, PlaylistRef, TrackObject};
use crate::spotify::MusicApi;

pub const WORKING_SET_LIMIT: usize = 20;

const PLAYLIST_PAGE_SIZE: u32 = 50;
const PLAYLIST_PAGE_CAP: u32 = 4;
const PLAYLIST_TRACKS_PAGE_SIZE: u32 = 100;
const PLAYLIST_TRACKS_PAGE_CAP: u32 = 4;
const HISTORY_PAGE_SIZE: u32 = 50;
const HISTORY_PAGE_CAP: u32 = 3;
const RECENT_DISTINCT_CAP: usize = 50;

/// Per-position decay applied to play history, most recent play first.
const PLAY_DECAY: f64 = 0.98;

/// Which upstream endpoint to build the working set from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Auto,
    OnRepeat,
    Top,
    Recent,
    RepeatDerived,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Auto => "auto",
            Source::OnRepeat => "on_repeat",
            Source::Top => "top",
            Source::Recent => "recent",
            Source::RepeatDerived => "repeat_derived",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Source::Auto),
            "on_repeat" => Ok(Source::OnRepeat),
            "top" => Ok(Source::Top),
            "recent" => Ok(Source::Recent),
            "repeat_derived" => Ok(Source::RepeatDerived),
            other => Err(format!(
                "invalid source '{}', expected one of: auto, on_repeat, top, recent, repeat_derived",
                other
            )),
        }
    }
}

/// Caller-supplied pagination hints, validated at the HTTP boundary.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Starting offset into the playlist listing.
    pub playlist_offset: u32,
    /// Starting offset (in tracks) into the matched playlist.
    pub playlist_track_offset: u32,
    /// Explicit playlist id, skipping the "on repeat" search.
    pub playlist_id: Option<String>,
}

/// One member of the working set: the upstream track plus, for the
/// history-based sources, its play signals.
#[derive(Debug, Clone)]
pub struct FetchedTrack {
    pub track: TrackObject,
    pub plays: Option<PlaySignals>,
}

/// The bounded track list for one ranking request and the source that
/// actually produced it.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    pub tracks: Vec<FetchedTrack>,
    pub source_used: Source,
}

impl WorkingSet {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Fetch the working set for the requested source, applying the auto
/// fallback chain when asked to.
pub async fn fetch_working_set(
    api: &dyn MusicApi,
    source: Source,
    opts: &FetchOptions,
) -> WorkingSet {
    match source {
        Source::OnRepeat => WorkingSet {
            tracks: fetch_on_repeat(api, opts).await,
            source_used: Source::OnRepeat,
        },
        Source::Top => WorkingSet {
            tracks: fetch_top(api).await,
            source_used: Source::Top,
        },
        Source::Recent => WorkingSet {
            tracks: fetch_recent_distinct(api).await,
            source_used: Source::Recent,
        },
        Source::RepeatDerived => WorkingSet {
            tracks: fetch_repeat_derived(api).await,
            source_used: Source::RepeatDerived,
        },
        Source::Auto => {
            let tracks = fetch_on_repeat(api, opts).await;
            if !tracks.is_empty() {
                return WorkingSet {
                    tracks,
                    source_used: Source::OnRepeat,
                };
            }
            debug!("on_repeat empty, falling back to top tracks");
            let tracks = fetch_top(api).await;
            if !tracks.is_empty() {
                return WorkingSet {
                    tracks,
                    source_used: Source::Top,
                };
            }
            debug!("top tracks empty, falling back to recent history");
            WorkingSet {
                tracks: fetch_recent_distinct(api).await,
                source_used: Source::Recent,
            }
        }
    }
}

fn without_plays(tracks: Vec<TrackObject>) -> Vec<FetchedTrack> {
    tracks
        .into_iter()
        .map(|track| FetchedTrack { track, plays: None })
        .collect()
}

/// Locate the user's "On Repeat" playlist and take its leading tracks.
async fn fetch_on_repeat(api: &dyn MusicApi, opts: &FetchOptions) -> Vec<FetchedTrack> {
    let playlist_id = match &opts.playlist_id {
        Some(id) => Some(id.clone()),
        None => find_on_repeat_playlist(api, opts.playlist_offset)
            .await
            .and_then(|p| p.id),
    };
    let Some(playlist_id) = playlist_id else {
        return Vec::new();
    };

    let mut tracks: Vec<TrackObject> = Vec::new();
    let mut offset = opts.playlist_track_offset;
    for _ in 0..PLAYLIST_TRACKS_PAGE_CAP {
        let page = match api
            .playlist_tracks_page(&playlist_id, PLAYLIST_TRACKS_PAGE_SIZE, offset)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!("playlist tracks page failed, keeping partial set: {}", err);
                break;
            }
        };
        let had_next = page.has_next();
        tracks.extend(
            page.items
                .into_iter()
                .filter_map(|entry| entry.track)
                .filter(TrackObject::is_playable_track),
        );
        if !had_next || tracks.len() >= WORKING_SET_LIMIT {
            break;
        }
        offset += PLAYLIST_TRACKS_PAGE_SIZE;
    }

    tracks.truncate(WORKING_SET_LIMIT);
    without_plays(tracks)
}

/// Search the user's playlists for an "on repeat" playlist.
///
/// A Spotify-owned playlist named exactly "On Repeat" wins; otherwise the
/// first playlist whose name matches case-insensitively.
async fn find_on_repeat_playlist(api: &dyn MusicApi, start_offset: u32) -> Option<PlaylistRef> {
    let pattern = Regex::new(r"(?i)\bon repeat\b").expect("static regex");

    let mut playlists: Vec<PlaylistRef> = Vec::new();
    let mut offset = start_offset;
    for _ in 0..PLAYLIST_PAGE_CAP {
        let page = match api.playlists_page(PLAYLIST_PAGE_SIZE, offset).await {
            Ok(page) => page,
            Err(err) => {
                warn!("playlists page failed, searching partial list: {}", err);
                break;
            }
        };
        let had_next = page.has_next();
        playlists.extend(page.items);
        if !had_next {
            break;
        }
        offset += PLAYLIST_PAGE_SIZE;
    }

    let spotify_owned = playlists.iter().find(|p| {
        p.name.as_deref() == Some("On Repeat")
            && p.owner.as_ref().and_then(|o| o.id.as_deref()) == Some("spotify")
    });
    if let Some(playlist) = spotify_owned {
        return Some(playlist.clone());
    }

    playlists
        .into_iter()
        .find(|p| p.name.as_deref().is_some_and(|n| pattern.is_match(n)))
}

async fn fetch_top(api: &dyn MusicApi) -> Vec<FetchedTrack> {
    let tracks = match api.top_tracks(WORKING_SET_LIMIT as u32).await {
        Ok(tracks) => tracks,
        Err(err) => {
            warn!("top tracks fetch failed: {}", err);
            return Vec::new();
        }
    };
    without_plays(
        tracks
            .into_iter()
            .filter(TrackObject::is_playable_track)
            .take(WORKING_SET_LIMIT)
            .collect(),
    )
}

/// Pull bounded play history, most recent first.
async fn fetch_history(api: &dyn MusicApi) -> Vec<PlayHistoryItem> {
    let mut plays: Vec<PlayHistoryItem> = Vec::new();
    let mut before: Option<i64> = None;
    for _ in 0..HISTORY_PAGE_CAP {
        let page = match api.recently_played_page(HISTORY_PAGE_SIZE, before).await {
            Ok(page) => page,
            Err(err) => {
                warn!("history page failed, keeping partial history: {}", err);
                break;
            }
        };
        if page.is_empty() {
            break;
        }
        // Cursor for the next page is the oldest play we have seen.
        before = page.last().and_then(PlayHistoryItem::played_at_ms);
        plays.extend(page);
        if before.is_none() {
            break;
        }
    }
    plays
}

/// Per-track aggregation of the history window.
fn aggregate_history(plays: &[PlayHistoryItem]) -> Vec<FetchedTrack> {
    // Keyed by track id; first occurrence is the most recent play.
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, FetchedTrack> = HashMap::new();

    for (position, item) in plays.iter().enumerate() {
        let Some(track) = &item.track else { continue };
        let Some(id) = track.id.clone() else { continue };
        let weight = PLAY_DECAY.powi(position as i32);

        match by_id.get_mut(&id) {
            Some(existing) => {
                let signals = existing.plays.get_or_insert_with(PlaySignals::default);
                signals.count += 1;
                signals.recency += weight;
            }
            None => {
                order.push(id.clone());
                by_id.insert(
                    id,
                    FetchedTrack {
                        track: track.clone(),
                        plays: Some(PlaySignals {
                            count: 1,
                            recency: weight,
                        }),
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

/// Distinct recently-played tracks, most recent first, with play signals.
async fn fetch_recent_distinct(api: &dyn MusicApi) -> Vec<FetchedTrack> {
    let plays = fetch_history(api).await;
    let mut tracks = aggregate_history(&plays);
    tracks.truncate(RECENT_DISTINCT_CAP);
    tracks
}

/// History grouped by track and ranked by summed decay weight, a stand-in
/// for the curated "On Repeat" playlist when it is unavailable.
async fn fetch_repeat_derived(api: &dyn MusicApi) -> Vec<FetchedTrack> {
    let plays = fetch_history(api).await;
    let mut tracks = aggregate_history(&plays);
    // Stable sort keeps most-recent-first order between equal weights.
    tracks.sort_by(|a, b| {
        let wa = a.plays.map(|p| p.recency).unwrap_or(0.0);
        let wb = b.plays.map(|p| p.recency).unwrap_or(0.0);
        wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
    });
    tracks.truncate(WORKING_SET_LIMIT);
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parsing() {
        assert_eq!("auto".parse::<Source>().unwrap(), Source::Auto);
        assert_eq!("on_repeat".parse::<Source>().unwrap(), Source::OnRepeat);
        assert_eq!("repeat_derived".parse::<Source>().unwrap(), Source::RepeatDerived);
        assert!("shuffle".parse::<Source>().is_err());
    }

    fn play(id: &str) -> PlayHistoryItem {
        PlayHistoryItem {
            track: Some(TrackObject {
                id: Some(id.to_string()),
                name: Some(id.to_string()),
                artists: vec![],
                album: None,
                popularity: None,
                duration_ms: None,
                kind: Some("track".to_string()),
            }),
            played_at: None,
        }
    }

    #[test]
    fn test_history_aggregation_dedupes_keeping_most_recent() {
        let plays = vec![play("a"), play("b"), play("a"), play("c"), play("a")];
        let tracks = aggregate_history(&plays);

        let ids: Vec<&str> = tracks
            .iter()
            .map(|t| t.track.id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let a = &tracks[0].plays.unwrap();
        assert_eq!(a.count, 3);
        // Positions 0, 2 and 4: 1 + 0.98^2 + 0.98^4.
        let expected = 1.0 + PLAY_DECAY.powi(2) + PLAY_DECAY.powi(4);
        assert!((a.recency - expected).abs() < 1e-12);

        let b = &tracks[1].plays.unwrap();
        assert_eq!(b.count, 1);
        assert!((b.recency - PLAY_DECAY).abs() < 1e-12);
    }

    #[test]
    fn test_history_aggregation_skips_idless_plays() {
        let mut anonymous = play("x");
        anonymous.track.as_mut().unwrap().id = None;
        let plays = vec![anonymous, play("a")];
        let tracks = aggregate_history(&plays);
        assert_eq!(tracks.len(), 1);
        // The anonymous play still occupied position 0 in the decay order.
        assert!((tracks[0].plays.unwrap().recency - PLAY_DECAY).abs() < 1e-12);
    }

    #[test]
    fn test_repeat_derived_ordering_by_summed_weight() {
        // "b" played twice (positions 1 and 2) outweighs "a" played once at
        // position 0.
        let plays = vec![play("a"), play("b"), play("b")];
        let mut tracks = aggregate_history(&plays);
        tracks.sort_by(|x, y| {
            let wx = x.plays.map(|p| p.recency).unwrap_or(0.0);
            let wy = y.plays.map(|p| p.recency).unwrap_or(0.0);
            wy.partial_cmp(&wx).unwrap()
        });
        assert_eq!(tracks[0].track.id.as_deref(), Some("b"));
    }
}
