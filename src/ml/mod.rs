// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Two model families behind the ChurnModel trait, plus the
// code that fits, evaluates and serves them.
//
//   boosting.rs   — gradient-boosted trees, pure Rust
//                   Deterministic for a seed; JSON artifact.
//
//   logistic.rs   — logistic regression trained with Burn
//                   (Autodiff<NdArray>, Adam, DataLoader);
//                   weights exported to a JSON artifact.
//
//   evaluation.rs — log loss, ROC AUC, accuracy, precision,
//                   recall.
//
//   trainer.rs    — one training run: fit, evaluate, persist
//                   a new artifact version.
//
//   inferencer.rs — loads a version, checks every artifact
//                   against the schema, scores records.
//
// Burn is only used here and in the data batcher.

/// Gradient-boosted decision trees
pub mod boosting;

/// Burn logistic regression
pub mod logistic;

/// Classification metrics
pub mod evaluation;

/// Training run orchestration
pub mod trainer;

/// Inference engine: loads artifacts and scores records
pub mod inferencer;
