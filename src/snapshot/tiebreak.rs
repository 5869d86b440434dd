//! Deterministic ordering for mode-sorted output.
//!
//! Primary key is the active mood's score, quantized into
//! [`SCORE_EPSILON`]-wide buckets; two scores in the same bucket fall through
//! a mood-specific list of secondary feature keys (bucketed the same way) and
//! finally the track name. Bucketing keeps the equivalence transitive, so the
//! comparator is a genuine total order and the sorted output does not depend
//! on the input permutation.

use std::cmp::Ordering;

use super::features::center_pref;
use super::mood::Mood;
use super::pipeline::ScoredTrack;

/// Width of a score bucket; keys landing in the same bucket are treated as
/// equal.
pub const SCORE_EPSILON: f64 = 1e-3;

fn bucket(x: f64) -> i64 {
    (x / SCORE_EPSILON).round() as i64
}

/// Compare two descending keys, `None` when they share a bucket.
fn cmp_desc(a: f64, b: f64) -> Option<Ordering> {
    // Larger key sorts first.
    match bucket(b).cmp(&bucket(a)) {
        Ordering::Equal => None,
        ord => Some(ord),
    }
}

/// Secondary comparison for near-equal scores.
fn tie_break(a: &ScoredTrack, b: &ScoredTrack, mood: Mood) -> Ordering {
    let fa = &a.features_n;
    let fb = &b.features_n;

    let keys: [Option<Ordering>; 3] = match mood {
        Mood::Hype => [
            cmp_desc(fa.energy, fb.energy),
            cmp_desc(fa.tempo, fb.tempo),
            cmp_desc(fa.danceability, fb.danceability),
        ],
        Mood::Focus => [
            cmp_desc(fa.instrumentalness, fb.instrumentalness),
            cmp_desc(1.0 - fa.speechiness, 1.0 - fb.speechiness),
            cmp_desc(center_pref(fa.energy), center_pref(fb.energy)),
        ],
        Mood::Chill => [
            cmp_desc(1.0 - fa.energy, 1.0 - fb.energy),
            cmp_desc(fa.acousticness, fb.acousticness),
            cmp_desc(fa.valence, fb.valence),
        ],
    };

    keys.into_iter()
        .flatten()
        .next()
        .unwrap_or_else(|| a.name.cmp(&b.name))
}

/// Total order for mode-sorted output.
///
/// Tracks without real audio features always sort after tracks with them,
/// regardless of derived score magnitude.
pub fn compare(a: &ScoredTrack, b: &ScoredTrack, mood: Mood) -> Ordering {
    if a.has_features != b.has_features {
        return if a.has_features {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    let sa = a.scores.get(mood);
    let sb = b.scores.get(mood);
    match cmp_desc(sa, sb) {
        Some(ord) => ord,
        None => tie_break(a, b, mood),
    }
}
