use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of mood profiles a snapshot can be ranked against.
///
/// Each mood is a pure scoring function over normalized features; the set is
/// closed and validated at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Hype,
    Focus,
    Chill,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Hype, Mood::Focus, Mood::Chill];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Hype => "hype",
            Mood::Focus => "focus",
            Mood::Chill => "chill",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hype" => Ok(Mood::Hype),
            "focus" => Ok(Mood::Focus),
            "chill" => Ok(Mood::Chill),
            other => Err(format!(
                "invalid mood '{}', expected one of: hype, focus, chill",
                other
            )),
        }
    }
}

/// One score per mood profile for a single track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodScores {
    pub hype: f64,
    pub focus: f64,
    pub chill: f64,
}

impl MoodScores {
    pub fn get(&self, mood: Mood) -> f64 {
        match mood {
            Mood::Hype => self.hype,
            Mood::Focus => self.focus,
            Mood::Chill => self.chill,
        }
    }
}

/// Raw-feature means over the working set, reported for display and fed to
/// the captioning gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub valence_avg: f64,
    pub energy_avg: f64,
    pub danceability_avg: f64,
    pub tempo_avg: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_parsing() {
        assert_eq!("hype".parse::<Mood>().unwrap(), Mood::Hype);
        assert_eq!("FOCUS".parse::<Mood>().unwrap(), Mood::Focus);
        assert_eq!("Chill".parse::<Mood>().unwrap(), Mood::Chill);
        assert!("party".parse::<Mood>().is_err());
    }

    #[test]
    fn test_mood_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mood::Hype).unwrap(), "\"hype\"");
        let m: Mood = serde_json::from_str("\"chill\"").unwrap();
        assert_eq!(m, Mood::Chill);
    }

    #[test]
    fn test_scores_by_mood() {
        let scores = MoodScores {
            hype: 0.9,
            focus: 0.5,
            chill: 0.1,
        };
        assert_eq!(scores.get(Mood::Hype), 0.9);
        assert_eq!(scores.get(Mood::Focus), 0.5);
        assert_eq!(scores.get(Mood::Chill), 0.1);
    }
}
