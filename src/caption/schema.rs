//! Caption contract: the snapshot-derived input shape, the structured output
//! schema, and the deterministic rules fallback.

use serde::{Deserialize, Serialize};

use crate::snapshot::pipeline::ExampleTrack;
use crate::snapshot::Stats;

/// Sole input contract of the captioning gateway: aggregate stats plus a
/// little context for flavor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionInput {
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub top_artists: Vec<String>,
    #[serde(default)]
    pub top_genres: Vec<String>,
    #[serde(default)]
    pub examples: Vec<ExampleTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyBand {
    Low,
    Medium,
    High,
}

/// Band thresholds shared by the fallback and by tests: <0.4 low, <0.7
/// medium, else high.
pub fn energy_band(energy_avg: f64) -> EnergyBand {
    if energy_avg < 0.4 {
        EnergyBand::Low
    } else if energy_avg < 0.7 {
        EnergyBand::Medium
    } else {
        EnergyBand::High
    }
}

/// Structured mood narrative, whether model-produced or rules-generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionOutput {
    pub mood_tags: Vec<String>,
    pub activities: Vec<String>,
    pub energy_band: EnergyBand,
    pub top_motifs: Vec<String>,
    pub primary_caption: String,
    pub alt_captions: Vec<String>,
    pub playlist_titles: Vec<String>,
    pub cover_prompt: String,
}

impl CaptionOutput {
    /// Enforce the schema limits a model response must satisfy before it is
    /// trusted. Mirrors the boundary validation of the query parameters.
    pub fn validate(&self) -> Result<(), String> {
        fn bounded(name: &str, len: usize, min: usize, max: usize) -> Result<(), String> {
            if len < min || len > max {
                Err(format!(
                    "{}: expected {}..={} entries, got {}",
                    name, min, max, len
                ))
            } else {
                Ok(())
            }
        }

        bounded("mood_tags", self.mood_tags.len(), 1, 6)?;
        bounded("activities", self.activities.len(), 1, 6)?;
        bounded("top_motifs", self.top_motifs.len(), 0, 3)?;
        bounded("alt_captions", self.alt_captions.len(), 0, 5)?;
        bounded("playlist_titles", self.playlist_titles.len(), 0, 7)?;
        if self.primary_caption.chars().count() > 120 {
            return Err("primary_caption: longer than 120 characters".to_string());
        }
        if self.cover_prompt.chars().count() > 180 {
            return Err("cover_prompt: longer than 180 characters".to_string());
        }
        Ok(())
    }
}

/// Deterministic caption generator used whenever the model is unavailable or
/// returns something that fails the schema.
pub fn rules_fallback(input: &CaptionInput) -> CaptionOutput {
    let v = input.stats.valence_avg;
    let e = input.stats.energy_avg;
    let d = input.stats.danceability_avg;

    let band = energy_band(e);
    let mood_tags = vec![
        if v > 0.6 {
            "sunny"
        } else if v < 0.4 {
            "moody"
        } else {
            "neutral"
        }
        .to_string(),
        if e > 0.6 {
            "hype"
        } else if e < 0.4 {
            "chill"
        } else {
            "even"
        }
        .to_string(),
        if d > 0.6 {
            "danceable"
        } else if d < 0.4 {
            "floaty"
        } else {
            "groovy"
        }
        .to_string(),
    ];

    let primary_caption = match band {
        EnergyBand::High => "High-energy, upbeat grooves keep you moving.",
        EnergyBand::Low => "Soft, reflective tracks for winding down.",
        EnergyBand::Medium => "Balanced, bright rhythm with room to breathe.",
    }
    .to_string();

    CaptionOutput {
        mood_tags,
        activities: vec![
            "coding".to_string(),
            "commute".to_string(),
            "gym warmup".to_string(),
        ],
        energy_band: band,
        top_motifs: vec!["steady kick".to_string(), "catchy hooks".to_string()],
        primary_caption,
        alt_captions: vec![
            "Sun’s out, beats up.".to_string(),
            "Calm focus, steady pulse.".to_string(),
        ],
        playlist_titles: vec![
            "Ship Mode".to_string(),
            "Sunlit Sprints".to_string(),
            "Deep Work Glow".to_string(),
            "Night Drive".to_string(),
            "Lo-Fi Lift".to_string(),
        ],
        cover_prompt: "minimalist vector of sunrise over city skyline with subtle equalizer bars"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_with_energy(e: f64) -> CaptionInput {
        CaptionInput {
            stats: Stats {
                energy_avg: e,
                valence_avg: 0.5,
                danceability_avg: 0.5,
                tempo_avg: 120.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_energy_band_thresholds() {
        assert_eq!(energy_band(0.39), EnergyBand::Low);
        assert_eq!(energy_band(0.4), EnergyBand::Medium);
        assert_eq!(energy_band(0.69), EnergyBand::Medium);
        assert_eq!(energy_band(0.7), EnergyBand::High);
    }

    #[test]
    fn test_fallback_is_deterministic_and_valid() {
        let input = input_with_energy(0.8);
        let a = rules_fallback(&input);
        let b = rules_fallback(&input);
        assert_eq!(a, b);
        a.validate().unwrap();
        assert_eq!(a.energy_band, EnergyBand::High);
        assert_eq!(
            a.primary_caption,
            "High-energy, upbeat grooves keep you moving."
        );
    }

    #[test]
    fn test_fallback_low_energy_caption() {
        let out = rules_fallback(&input_with_energy(0.2));
        assert_eq!(out.energy_band, EnergyBand::Low);
        assert_eq!(out.primary_caption, "Soft, reflective tracks for winding down.");
        assert_eq!(out.mood_tags[1], "chill");
    }

    #[test]
    fn test_validation_rejects_out_of_bounds() {
        let mut out = rules_fallback(&CaptionInput::default());
        out.mood_tags.clear();
        assert!(out.validate().is_err());

        let mut out = rules_fallback(&CaptionInput::default());
        out.primary_caption = "x".repeat(121);
        assert!(out.validate().is_err());

        let mut out = rules_fallback(&CaptionInput::default());
        out.playlist_titles = vec!["t".to_string(); 8];
        assert!(out.validate().is_err());
    }

    #[test]
    fn test_energy_band_serde_lowercase() {
        assert_eq!(serde_json::to_string(&EnergyBand::High).unwrap(), "\"high\"");
        let band: EnergyBand = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(band, EnergyBand::Low);
    }
}
