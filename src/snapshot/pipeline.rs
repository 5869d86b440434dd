//! The ranking pipeline: fetch → features → normalize → score → sort.
//!
//! Upstream trouble degrades rather than fails: a dead feature endpoint
//! switches the whole set to derived scoring, a dead artists endpoint just
//! loses genre tags, and only an entirely empty working set short-circuits
//! into the typed no-tracks outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::features::{FeatureRanges, NormalizedFeatures};
use super::mood::{Mood, MoodScores, Stats};
use super::scoring::{derived_scores, ScoringStrategy};
use super::sources::{fetch_working_set, FetchOptions, FetchedTrack, Source};
use super::tiebreak;
use crate::spotify::models::AudioFeatures;
use crate::spotify::MusicApi;

const FEATURE_BATCH_SIZE: usize = 100;
const ARTIST_BATCH_SIZE: usize = 50;
const TOP_GENRES_LIMIT: usize = 8;
const TOP_ARTISTS_LIMIT: usize = 5;
const EXAMPLES_LIMIT: usize = 3;

/// Validated inputs for one snapshot request.
#[derive(Debug, Clone, Default)]
pub struct SnapshotParams {
    pub mode: Option<Mood>,
    pub source: Source,
    pub fetch: FetchOptions,
}

/// Whether scores came from real audio features or the derived fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    Real,
    Derived,
}

/// A working-set track with its normalized features and per-mood scores.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub image: Option<String>,
    pub features_n: NormalizedFeatures,
    pub scores: MoodScores,
    pub has_features: bool,
}

/// Example track surfaced alongside the aggregate stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleTrack {
    pub name: String,
    pub artist: String,
    pub genres: Vec<String>,
}

/// The assembled listening snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub mode: Option<Mood>,
    pub source_used: Source,
    pub scoring_mode: ScoringMode,
    pub stats: Stats,
    pub top_artists: Vec<String>,
    pub top_genres: Vec<String>,
    pub examples: Vec<ExampleTrack>,
    pub tracks: Vec<ScoredTrack>,
}

/// Outcome of a pipeline run. Exhausting every source is a normal result,
/// not an error.
#[derive(Debug)]
pub enum SnapshotOutcome {
    Ready(Box<Snapshot>),
    NoTracks,
}

/// Run the full pipeline against the given API view.
pub async fn build_snapshot(
    api: &dyn MusicApi,
    params: &SnapshotParams,
    strategy: ScoringStrategy,
) -> SnapshotOutcome {
    let working_set = fetch_working_set(api, params.source, &params.fetch).await;
    if working_set.is_empty() {
        info!("all sources exhausted with zero tracks");
        return SnapshotOutcome::NoTracks;
    }
    let source_used = working_set.source_used;
    let items = working_set.tracks;
    debug!("working set: {} tracks from {}", items.len(), source_used);

    let track_ids: Vec<String> = items
        .iter()
        .filter_map(|t| t.track.id.clone())
        .collect();

    let feature_rows = fetch_feature_rows(api, &track_ids).await;
    let features_by_id: HashMap<&str, &AudioFeatures> = feature_rows
        .iter()
        .flatten()
        .filter_map(|row| row.id.as_deref().map(|id| (id, row)))
        .collect();

    let scoring_mode = if features_by_id.is_empty() {
        ScoringMode::Derived
    } else {
        ScoringMode::Real
    };
    if scoring_mode == ScoringMode::Derived {
        info!("no audio features available, using derived play-signal scoring");
    }

    let present_rows: Vec<&AudioFeatures> = feature_rows.iter().flatten().collect();
    let ranges = FeatureRanges::from_rows(present_rows.iter().copied());
    let stats = compute_stats(&feature_rows);

    let top_genres = fetch_top_genres(api, &items).await;
    let top_artists = collect_top_artists(&items);
    let examples = collect_examples(&items);

    let mut tracks: Vec<ScoredTrack> = items
        .iter()
        .map(|item| score_track(item, &features_by_id, &ranges, strategy))
        .collect();

    if let Some(mood) = params.mode {
        tracks.sort_by(|a, b| tiebreak::compare(a, b, mood));
    }

    SnapshotOutcome::Ready(Box::new(Snapshot {
        mode: params.mode,
        source_used,
        scoring_mode,
        stats,
        top_artists,
        top_genres,
        examples,
        tracks,
    }))
}

/// Batch feature lookup in bounded chunks. A failed chunk contributes no
/// rows; its tracks fall back to derived scoring.
async fn fetch_feature_rows(
    api: &dyn MusicApi,
    track_ids: &[String],
) -> Vec<Option<AudioFeatures>> {
    let mut rows: Vec<Option<AudioFeatures>> = Vec::with_capacity(track_ids.len());
    for chunk in track_ids.chunks(FEATURE_BATCH_SIZE) {
        match api.audio_features(chunk).await {
            Ok(batch) => rows.extend(batch),
            Err(err) => {
                warn!("audio-features batch failed: {}", err);
            }
        }
    }
    rows
}

fn score_track(
    item: &FetchedTrack,
    features_by_id: &HashMap<&str, &AudioFeatures>,
    ranges: &FeatureRanges,
    strategy: ScoringStrategy,
) -> ScoredTrack {
    let track = &item.track;
    let id = track.id.clone().unwrap_or_default();
    let row = features_by_id.get(id.as_str()).copied();

    let (features_n, scores, has_features) = match row {
        Some(row) => {
            let normalized = ranges.normalize(row);
            (normalized, strategy.score_all(&normalized), true)
        }
        None => (
            NormalizedFeatures::neutral(),
            derived_scores(track.popularity, track.duration_ms, item.plays.as_ref()),
            false,
        ),
    };

    ScoredTrack {
        id,
        name: track.name.clone().unwrap_or_default(),
        artists: track
            .artists
            .iter()
            .filter_map(|a| a.name.clone())
            .collect(),
        image: track.cover_image(),
        features_n,
        scores,
        has_features,
    }
}

/// Raw-feature means over the returned feature list. Null rows count toward
/// the denominator; a missing attribute contributes zero to the sum.
fn compute_stats(rows: &[Option<AudioFeatures>]) -> Stats {
    let n = rows.len().max(1) as f64;
    let sum = |get: fn(&AudioFeatures) -> Option<f64>| {
        rows.iter().flatten().filter_map(get).sum::<f64>() / n
    };
    Stats {
        valence_avg: sum(|f| f.valence),
        energy_avg: sum(|f| f.energy),
        danceability_avg: sum(|f| f.danceability),
        tempo_avg: sum(|f| f.tempo),
    }
}

/// Genre tags counted over the working set's artists, most frequent first,
/// ties kept in first-seen order.
async fn fetch_top_genres(api: &dyn MusicApi, items: &[FetchedTrack]) -> Vec<String> {
    let mut artist_ids: Vec<String> = Vec::new();
    let mut seen: HashMap<String, ()> = HashMap::new();
    for item in items {
        for artist in &item.track.artists {
            if let Some(id) = &artist.id {
                if seen.insert(id.clone(), ()).is_none() {
                    artist_ids.push(id.clone());
                }
            }
        }
    }
    if artist_ids.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for chunk in artist_ids.chunks(ARTIST_BATCH_SIZE) {
        let artists = match api.artists(chunk).await {
            Ok(artists) => artists,
            Err(err) => {
                warn!("artists batch failed, skipping chunk: {}", err);
                continue;
            }
        };
        for artist in artists {
            for genre in artist.genres {
                if !counts.contains_key(&genre) {
                    first_seen.push(genre.clone());
                }
                *counts.entry(genre).or_insert(0) += 1;
            }
        }
    }

    let rank: HashMap<&str, usize> = first_seen
        .iter()
        .enumerate()
        .map(|(i, g)| (g.as_str(), i))
        .collect();
    let mut genres: Vec<(String, usize)> = counts.into_iter().collect();
    genres.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| rank[a.0.as_str()].cmp(&rank[b.0.as_str()]))
    });
    genres
        .into_iter()
        .take(TOP_GENRES_LIMIT)
        .map(|(g, _)| g)
        .collect()
}

/// Distinct artist names in working-set order.
fn collect_top_artists(items: &[FetchedTrack]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for item in items {
        for artist in &item.track.artists {
            if let Some(name) = &artist.name {
                if !names.contains(name) {
                    names.push(name.clone());
                    if names.len() == TOP_ARTISTS_LIMIT {
                        return names;
                    }
                }
            }
        }
    }
    names
}

fn collect_examples(items: &[FetchedTrack]) -> Vec<ExampleTrack> {
    items
        .iter()
        .take(EXAMPLES_LIMIT)
        .map(|item| ExampleTrack {
            name: item.track.name.clone().unwrap_or_default(),
            artist: item
                .track
                .artists
                .first()
                .and_then(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            genres: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, valence: f64, energy: f64) -> Option<AudioFeatures> {
        Some(AudioFeatures {
            id: Some(id.to_string()),
            valence: Some(valence),
            energy: Some(energy),
            ..Default::default()
        })
    }

    #[test]
    fn test_stats_null_rows_count_toward_denominator() {
        let rows = vec![row("a", 0.2, 0.4), None, row("b", 0.6, 0.8)];
        let stats = compute_stats(&rows);
        assert!((stats.valence_avg - 0.8 / 3.0).abs() < 1e-12);
        assert!((stats.energy_avg - 1.2 / 3.0).abs() < 1e-12);
        assert_eq!(stats.tempo_avg, 0.0);
    }

    #[test]
    fn test_stats_empty_rows_do_not_divide_by_zero() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.energy_avg, 0.0);
    }
}
