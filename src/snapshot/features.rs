//! Feature normalization scoped to the current working set.
//!
//! Raw audio attributes are rescaled to [0,1] against the min/max observed
//! within this request's track set, one column at a time. Missing values and
//! degenerate columns (all-equal, single track) normalize to a neutral 0.5 so
//! they neither attract nor repel any mood target.

use serde::{Deserialize, Serialize};

use crate::spotify::models::AudioFeatures;

/// Neutral normalized value for absent or degenerate data.
pub const NEUTRAL: f64 = 0.5;

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Preference for mid-range values: 1.0 at 0.5, falling linearly to 0.0 at
/// either extreme.
pub fn center_pref(x: f64) -> f64 {
    clamp01(1.0 - (x - 0.5).abs() * 2.0)
}

/// Per-track audio attributes rescaled to [0,1] within the working set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatures {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub tempo: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub speechiness: f64,
}

impl NormalizedFeatures {
    /// All-neutral vector, used for tracks without a feature row.
    pub fn neutral() -> Self {
        Self {
            energy: NEUTRAL,
            danceability: NEUTRAL,
            valence: NEUTRAL,
            tempo: NEUTRAL,
            acousticness: NEUTRAL,
            instrumentalness: NEUTRAL,
            speechiness: NEUTRAL,
        }
    }
}

/// Observed (min, max) per attribute over the working set.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRanges {
    energy: (f64, f64),
    danceability: (f64, f64),
    valence: (f64, f64),
    tempo: (f64, f64),
    acousticness: (f64, f64),
    instrumentalness: (f64, f64),
    speechiness: (f64, f64),
}

fn column_range<'a>(
    rows: &[&'a AudioFeatures],
    get: impl Fn(&'a AudioFeatures) -> Option<f64>,
) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for row in rows {
        if let Some(v) = get(row) {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
    }
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

/// Rescale one value against a column range. Missing or non-finite values and
/// collapsed ranges map to the neutral center.
pub fn minmax(v: Option<f64>, min: f64, max: f64) -> f64 {
    let v = match v {
        Some(v) if v.is_finite() => v,
        _ => return NEUTRAL,
    };
    if max <= min {
        return NEUTRAL;
    }
    (v - min) / (max - min)
}

impl FeatureRanges {
    /// Compute per-column ranges over every present feature row in the set.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a AudioFeatures>) -> Self {
        let rows: Vec<&AudioFeatures> = rows.into_iter().collect();
        Self {
            energy: column_range(&rows, |f| f.energy),
            danceability: column_range(&rows, |f| f.danceability),
            valence: column_range(&rows, |f| f.valence),
            tempo: column_range(&rows, |f| f.tempo),
            acousticness: column_range(&rows, |f| f.acousticness),
            instrumentalness: column_range(&rows, |f| f.instrumentalness),
            speechiness: column_range(&rows, |f| f.speechiness),
        }
    }

    pub fn normalize(&self, row: &AudioFeatures) -> NormalizedFeatures {
        NormalizedFeatures {
            energy: minmax(row.energy, self.energy.0, self.energy.1),
            danceability: minmax(row.danceability, self.danceability.0, self.danceability.1),
            valence: minmax(row.valence, self.valence.0, self.valence.1),
            tempo: minmax(row.tempo, self.tempo.0, self.tempo.1),
            acousticness: minmax(row.acousticness, self.acousticness.0, self.acousticness.1),
            instrumentalness: minmax(
                row.instrumentalness,
                self.instrumentalness.0,
                self.instrumentalness.1,
            ),
            speechiness: minmax(row.speechiness, self.speechiness.0, self.speechiness.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(energy: f64, tempo: f64) -> AudioFeatures {
        AudioFeatures {
            id: Some("x".to_string()),
            energy: Some(energy),
            tempo: Some(tempo),
            ..Default::default()
        }
    }

    #[test]
    fn test_extremes_map_to_unit_interval() {
        let rows = [row(0.2, 90.0), row(0.8, 140.0), row(0.5, 120.0)];
        let ranges = FeatureRanges::from_rows(rows.iter());

        let lo = ranges.normalize(&rows[0]);
        let hi = ranges.normalize(&rows[1]);
        let mid = ranges.normalize(&rows[2]);

        assert_eq!(lo.energy, 0.0);
        assert_eq!(hi.energy, 1.0);
        assert!(mid.energy > 0.0 && mid.energy < 1.0);
        assert_eq!(lo.tempo, 0.0);
        assert_eq!(hi.tempo, 1.0);
    }

    #[test]
    fn test_degenerate_column_is_neutral_for_all() {
        // Single track, and a multi-track set where every value is equal.
        let single = [row(0.7, 120.0)];
        let ranges = FeatureRanges::from_rows(single.iter());
        assert_eq!(ranges.normalize(&single[0]).energy, NEUTRAL);

        let equal = [row(0.3, 100.0), row(0.3, 100.0)];
        let ranges = FeatureRanges::from_rows(equal.iter());
        for r in &equal {
            assert_eq!(ranges.normalize(r).energy, NEUTRAL);
            assert_eq!(ranges.normalize(r).tempo, NEUTRAL);
        }
    }

    #[test]
    fn test_missing_value_is_neutral_not_zero() {
        let mut partial = row(0.9, 130.0);
        partial.valence = None;
        let full = AudioFeatures {
            id: Some("y".to_string()),
            energy: Some(0.1),
            tempo: Some(80.0),
            valence: Some(0.6),
            ..Default::default()
        };
        let rows = [partial.clone(), full];
        let ranges = FeatureRanges::from_rows(rows.iter());
        assert_eq!(ranges.normalize(&partial).valence, NEUTRAL);
    }

    #[test]
    fn test_columns_scale_independently() {
        // A wild tempo range must not affect energy scaling.
        let rows = [row(0.4, 60.0), row(0.6, 200.0)];
        let ranges = FeatureRanges::from_rows(rows.iter());
        assert_eq!(ranges.normalize(&rows[0]).energy, 0.0);
        assert_eq!(ranges.normalize(&rows[1]).energy, 1.0);
    }

    #[test]
    fn test_center_pref() {
        assert_eq!(center_pref(0.5), 1.0);
        assert_eq!(center_pref(0.0), 0.0);
        assert_eq!(center_pref(1.0), 0.0);
        assert!((center_pref(0.25) - 0.5).abs() < 1e-12);
    }
}
