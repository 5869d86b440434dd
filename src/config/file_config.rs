//! Optional TOML configuration file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root of the TOML config file. Every field is optional; anything present
/// overrides the corresponding CLI value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub frontend_dir_path: Option<String>,
    pub session_ttl_secs: Option<i64>,
    /// `"linear"` or `"gaussian"`.
    pub scoring_strategy: Option<String>,
    pub spotify: Option<SpotifyFileConfig>,
    pub openai: Option<OpenAiFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            port = 8080
            scoring_strategy = "linear"

            [spotify]
            client_id = "cid"
            redirect_uri = "http://localhost:8080/callback"

            [openai]
            api_key = "sk-test"
            model = "gpt-4o-mini"
        "#;
        let config: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.scoring_strategy.as_deref(), Some("linear"));
        assert_eq!(
            config.spotify.unwrap().client_id.as_deref(),
            Some("cid")
        );
        assert_eq!(config.openai.unwrap().api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.port.is_none());
        assert!(config.spotify.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 4000").unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.port, Some(4000));
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(FileConfig::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
