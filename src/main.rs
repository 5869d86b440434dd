use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use snapmood_server::auth::SpotifyAuthClient;
use snapmood_server::caption::CaptionClient;
use snapmood_server::config::{AppConfig, CliConfig, FileConfig};
use snapmood_server::server::{run_server, ServerState};
use snapmood_server::session::{PendingAuthStore, SessionStore, DEFAULT_SESSION_TTL_SECS};
use snapmood_server::snapshot::ScoringStrategy;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to an optional TOML config file; its values override CLI flags.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Spotify application client id.
    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Spotify application client secret (only needed for app-token calls).
    #[clap(long, env = "SPOTIFY_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// OAuth redirect URI registered with Spotify. Defaults to
    /// http://localhost:<port>/callback.
    #[clap(long)]
    pub redirect_uri: Option<String>,

    /// API key for the captioning model; without it the rules fallback is
    /// always used.
    #[clap(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible captioning API.
    #[clap(long, default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Captioning model name.
    #[clap(long, default_value = "gpt-4o-mini")]
    pub openai_model: String,

    /// Mood scoring strategy: linear or gaussian.
    #[clap(long, default_value = "gaussian", value_parser = parse_scoring)]
    pub scoring: ScoringStrategy,

    /// Session lifetime in seconds.
    #[clap(long, default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: i64,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

fn parse_scoring(s: &str) -> Result<ScoringStrategy, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let cli_config = CliConfig {
        port: cli_args.port,
        config_file: cli_args.config.clone(),
        frontend_dir_path: cli_args.frontend_dir_path.clone(),
        session_ttl_secs: cli_args.session_ttl_secs,
        scoring_strategy: cli_args.scoring,
        spotify_client_id: cli_args.client_id.clone(),
        spotify_client_secret: cli_args.client_secret.clone(),
        redirect_uri: cli_args.redirect_uri.clone(),
        openai_api_key: cli_args.openai_api_key.clone(),
        openai_base_url: cli_args.openai_base_url.clone(),
        openai_model: cli_args.openai_model.clone(),
    };

    let config = Arc::new(
        AppConfig::resolve(&cli_config, file_config).context("Failed to resolve configuration")?,
    );

    let http = reqwest::Client::new();

    let sessions = Arc::new(SessionStore::new(config.session_ttl_secs));
    let pending_auth = Arc::new(PendingAuthStore::new());

    let auth = Arc::new(SpotifyAuthClient::new(
        http.clone(),
        config.spotify.client_id.clone(),
        config.spotify.client_secret.clone(),
        config.spotify.redirect_uri.clone(),
    ));

    if config.openai.api_key.is_none() {
        info!("No captioning API key configured, captions will use the rules fallback");
    }
    let caption = Arc::new(CaptionClient::new(
        http.clone(),
        config.openai.base_url.clone(),
        config.openai.model.clone(),
        config.openai.api_key.clone(),
    ));

    // Periodically drop expired sessions and abandoned login attempts.
    {
        let sessions = sessions.clone();
        let pending_auth = pending_auth.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let pruned = sessions.cleanup_expired().await;
                if pruned > 0 {
                    info!("Pruned {} expired sessions", pruned);
                }
                pending_auth.cleanup_expired().await;
            }
        });
    }

    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        http,
        sessions,
        pending_auth,
        auth,
        caption,
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state).await
}
