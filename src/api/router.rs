use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::health;
use super::scoring;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/schema", get(scoring::schema))
        .route("/api/predict", post(scoring::predict))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address '{host}:{port}'"))?;

    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;
    tracing::info!("Scoring demo listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
