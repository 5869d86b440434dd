mod file_config;

pub use file_config::{FileConfig, OpenAiFileConfig, SpotifyFileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::session::DEFAULT_SESSION_TTL_SECS;
use crate::snapshot::ScoringStrategy;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub config_file: Option<PathBuf>,
    pub frontend_dir_path: Option<String>,
    pub session_ttl_secs: i64,
    pub scoring_strategy: ScoringStrategy,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            config_file: None,
            frontend_dir_path: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            scoring_strategy: ScoringStrategy::default(),
            spotify_client_id: None,
            spotify_client_secret: None,
            redirect_uri: None,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    pub session_ttl_secs: i64,
    pub scoring_strategy: ScoringStrategy,
    pub spotify: SpotifySettings,
    pub openai: OpenAiSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let file_spotify = file.spotify.unwrap_or_default();
        let file_openai = file.openai.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let client_id = file_spotify
            .client_id
            .or_else(|| cli.spotify_client_id.clone());
        let Some(client_id) = client_id else {
            bail!("Spotify client id must be specified via --client-id, SPOTIFY_CLIENT_ID, or the config file");
        };
        if client_id.trim().is_empty() {
            bail!("Spotify client id must not be empty");
        }

        let client_secret = file_spotify
            .client_secret
            .or_else(|| cli.spotify_client_secret.clone());

        let redirect_uri = file_spotify
            .redirect_uri
            .or_else(|| cli.redirect_uri.clone())
            .unwrap_or_else(|| format!("http://localhost:{}/callback", port));

        let scoring_strategy = match file.scoring_strategy {
            Some(raw) => raw
                .parse::<ScoringStrategy>()
                .map_err(|e| anyhow::anyhow!(e))?,
            None => cli.scoring_strategy,
        };

        let session_ttl_secs = file.session_ttl_secs.unwrap_or(cli.session_ttl_secs);
        if session_ttl_secs <= 0 {
            bail!("session_ttl_secs must be positive");
        }

        Ok(Self {
            port,
            frontend_dir_path: file
                .frontend_dir_path
                .or_else(|| cli.frontend_dir_path.clone()),
            session_ttl_secs,
            scoring_strategy,
            spotify: SpotifySettings {
                client_id,
                client_secret,
                redirect_uri,
            },
            openai: OpenAiSettings {
                api_key: file_openai
                    .api_key
                    .or_else(|| cli.openai_api_key.clone()),
                base_url: file_openai
                    .base_url
                    .unwrap_or_else(|| cli.openai_base_url.clone()),
                model: file_openai.model.unwrap_or_else(|| cli.openai_model.clone()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_client_id() -> CliConfig {
        CliConfig {
            spotify_client_id: Some("cli-id".to_string()),
            ..CliConfig::default()
        }
    }

    #[test]
    fn test_missing_client_id_fails() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_only_resolution_with_defaults() {
        let config = AppConfig::resolve(&cli_with_client_id(), None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.spotify.client_id, "cli-id");
        assert_eq!(
            config.spotify.redirect_uri,
            "http://localhost:3000/callback"
        );
        assert_eq!(config.scoring_strategy, ScoringStrategy::Gaussian);
        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
    }

    #[test]
    fn test_file_overrides_cli() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 9999
            scoring_strategy = "linear"

            [spotify]
            client_id = "file-id"
        "#,
        )
        .unwrap();

        let config = AppConfig::resolve(&cli_with_client_id(), Some(file)).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.spotify.client_id, "file-id");
        assert_eq!(config.scoring_strategy, ScoringStrategy::Linear);
        // Default redirect follows the resolved (file) port.
        assert_eq!(
            config.spotify.redirect_uri,
            "http://localhost:9999/callback"
        );
    }

    #[test]
    fn test_invalid_scoring_strategy_in_file_fails() {
        let file: FileConfig = toml::from_str(r#"scoring_strategy = "cubic""#).unwrap();
        assert!(AppConfig::resolve(&cli_with_client_id(), Some(file)).is_err());
    }
}
