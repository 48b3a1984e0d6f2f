// ============================================================
// Layer 1b — HTTP Scoring Demo
// ============================================================
// A thin axum front end over PredictUseCase:
//
//   GET  /health       — liveness + crate version
//   GET  /api/schema   — the frozen feature schema
//   POST /api/predict  — score one record
//
// Handlers never touch models directly; they only translate
// HTTP in and out of Layer 2.

pub mod error;
pub mod health;
pub mod json;
pub mod router;
pub mod scoring;
pub mod state;

pub use router::{create_router, serve};
pub use state::AppState;
