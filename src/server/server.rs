use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tracing::info;

use super::http_layers::log_requests;
use super::routes;
use super::state::ServerState;

pub fn build_router(state: ServerState) -> Router {
    let mut router = Router::new()
        .route("/status", get(routes::home))
        .route("/login", get(routes::login))
        .route("/callback", get(routes::callback))
        .route("/logout", post(routes::logout))
        .route("/api/snapshot", get(routes::snapshot))
        .route("/api/analyze", post(routes::analyze));

    if let Some(frontend_dir) = &state.config.frontend_dir_path {
        info!("Serving frontend from {}", frontend_dir);
        router = router.fallback_service(ServeDir::new(frontend_dir));
    }

    router
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on port {}", port);
    axum::serve(listener, router).await?;
    Ok(())
}
