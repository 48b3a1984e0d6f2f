//! Liveness endpoint

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status:  &'static str,
    pub version: &'static str,
}

/// Returns 200 while the process is up.
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status:  "ok",
        version: env!("CARGO_PKG_VERSION"),
    };
    (StatusCode::OK, Json(response))
}
