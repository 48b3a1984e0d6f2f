// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams the application layer programs against:
//   - TableSource: anything that yields a raw activity table
//   - ChurnModel:  anything that turns an encoded row into a
//                  churn probability

use anyhow::Result;

use crate::data::table::Table;
use crate::domain::error::SchemaMismatch;
use crate::domain::prediction::ModelKind;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// A source of raw activity snapshots.
///
/// Implementations:
///   - TableLoader → Parquet / CSV files or a directory of them
pub trait TableSource {
    fn load(&self) -> Result<Table>;
}

// ─── ChurnModel ───────────────────────────────────────────────────────────────
/// A trained binary classifier over encoded feature rows.
///
/// Implementations:
///   - BoostedArtifact  → gradient-boosted trees
///   - LogisticArtifact → scaled logistic regression
pub trait ChurnModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Fingerprint of the schema this model was fitted against.
    fn schema_fingerprint(&self) -> &str;

    /// Encoded columns, in the order the model expects them.
    fn columns(&self) -> &[String];

    /// Internal consistency of the artifact against its own `columns()`,
    /// e.g. one coefficient per column. Runs before the model is served.
    fn check_shape(&self) -> Result<(), SchemaMismatch>;

    /// P(churn) for one encoded row; `features.len() == columns().len()`.
    fn predict_proba(&self, features: &[f64]) -> f64;
}
