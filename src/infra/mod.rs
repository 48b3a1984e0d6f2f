// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by several layers:
//
//   checkpoint.rs — Versioned artifact store
//                   Schema, both models and the training config
//                   as JSON under models/v{N}/, plus the
//                   latest_version.json pointer.
//
//   metrics.rs    — Evaluation metrics logging
//                   One CSV row per (model, split).
//
//   logging.rs    — tracing-subscriber setup
//                   Pretty or JSON output, EnvFilter levels.

/// Versioned artifact storage
pub mod checkpoint;

/// Evaluation metrics CSV logger
pub mod metrics;

/// tracing subscriber initialisation
pub mod logging;
