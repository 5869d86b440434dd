//! Mood scoring over normalized features, plus the derived fallback used
//! when upstream has no audio analysis for the working set.
//!
//! Two interchangeable strategies produce the per-mood scores: the historical
//! linear blend and the Gaussian target form. Both map a normalized feature
//! vector to [0,1]-ish scores with the same weight scheme; the Gaussian form
//! discriminates harder near its targets and is the default.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::features::{center_pref, clamp01, NormalizedFeatures};
use super::mood::{Mood, MoodScores};

/// Default width of a Gaussian feature preference.
const SIGMA_DEFAULT: f64 = 0.18;

/// Closeness of `x` to the target `mu`, as a Gaussian with width `sigma`.
pub fn gaussian_pref(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringStrategy {
    /// Convex combination of features and their complements.
    Linear,
    /// Gaussian preference toward per-feature targets.
    #[default]
    Gaussian,
}

impl FromStr for ScoringStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(ScoringStrategy::Linear),
            "gaussian" => Ok(ScoringStrategy::Gaussian),
            other => Err(format!(
                "invalid scoring strategy '{}', expected 'linear' or 'gaussian'",
                other
            )),
        }
    }
}

impl ScoringStrategy {
    pub fn score(&self, f: &NormalizedFeatures, mood: Mood) -> f64 {
        match self {
            ScoringStrategy::Linear => score_linear(f, mood),
            ScoringStrategy::Gaussian => score_gaussian(f, mood),
        }
    }

    pub fn score_all(&self, f: &NormalizedFeatures) -> MoodScores {
        MoodScores {
            hype: self.score(f, Mood::Hype),
            focus: self.score(f, Mood::Focus),
            chill: self.score(f, Mood::Chill),
        }
    }
}

fn score_linear(f: &NormalizedFeatures, mood: Mood) -> f64 {
    match mood {
        // Big energy/dance, faster tempo, brighter mood.
        Mood::Hype => {
            0.5 * f.energy + 0.2 * f.danceability + 0.2 * f.tempo + 0.1 * f.valence
        }
        // Instrumental, low speech; mid energy/tempo to avoid hype and sleep.
        Mood::Focus => {
            0.5 * f.instrumentalness
                + 0.25 * (1.0 - f.speechiness)
                + 0.15 * center_pref(f.energy)
                + 0.1 * center_pref(f.tempo)
        }
        // Low energy/tempo, acoustic texture, pleasant valence.
        Mood::Chill => {
            0.45 * (1.0 - f.energy)
                + 0.25 * f.acousticness
                + 0.2 * (1.0 - f.tempo)
                + 0.1 * f.valence
        }
    }
}

fn score_gaussian(f: &NormalizedFeatures, mood: Mood) -> f64 {
    let g = |x: f64, mu: f64| gaussian_pref(x, mu, SIGMA_DEFAULT);
    match mood {
        Mood::Hype => {
            0.48 * g(f.energy, 0.95)
                + 0.22 * g(f.danceability, 0.9)
                + 0.2 * g(f.tempo, 0.88)
                + 0.1 * g(f.valence, 0.6)
        }
        Mood::Focus => {
            0.45 * g(f.instrumentalness, 0.9)
                + 0.25 * g(1.0 - f.speechiness, 0.95)
                + 0.15 * gaussian_pref(f.energy, 0.5, 0.2)
                + 0.15 * gaussian_pref(f.tempo, 0.5, 0.2)
        }
        Mood::Chill => {
            0.45 * g(f.energy, 0.15)
                + 0.25 * g(f.tempo, 0.25)
                + 0.2 * gaussian_pref(f.acousticness, 0.8, 0.22)
                + 0.1 * gaussian_pref(f.valence, 0.55, 0.25)
        }
    }
}

/// Play-history signals carried by the `recent`/`repeat_derived` sources and
/// consumed by the derived fallback scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaySignals {
    /// Number of plays of this track inside the history window.
    pub count: u32,
    /// Summed exponential-decay weight of the track's play positions.
    pub recency: f64,
}

fn norm_range(v: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.5;
    }
    clamp01((v - min) / (max - min))
}

/// Fallback mood scores from play metadata, for tracks with no feature row.
///
/// Deliberately coarse but never degenerate: the chill term keeps at least
/// one score above zero even with no popularity or duration data, so a
/// feature outage still yields a usable ordering.
pub fn derived_scores(
    popularity: Option<u8>,
    duration_ms: Option<u64>,
    plays: Option<&PlaySignals>,
) -> MoodScores {
    let pop = f64::from(popularity.unwrap_or(0)) / 100.0;
    let duration_min = duration_ms.unwrap_or(0) as f64 / 60_000.0;
    let (count, recency) = plays.map(|p| (f64::from(p.count), p.recency)).unwrap_or((0.0, 0.0));

    let hype = 0.5 * norm_range(recency, 0.0, 3.0) + 0.5 * pop;
    let focus = 0.6 * clamp01(1.0 - (duration_min - 3.5).abs() / 3.5)
        + 0.4 * norm_range(count, 0.0, 4.0);
    let chill = 0.5 * (1.0 - pop)
        + 0.5 * norm_range(4.5 - (duration_min - 4.5).abs(), 0.0, 4.5);

    MoodScores {
        hype: clamp01(hype),
        focus: clamp01(focus),
        chill: clamp01(chill),
    }
}
