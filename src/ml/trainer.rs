// ============================================================
// Layer 5 — Training Run
// ============================================================
// Fits both model families on the training split, evaluates
// them on validation and test, and stores everything as one
// new artifact version.
//
// Order of writes:
//   1. vN/feature_schema.json, vN/train_config.json
//   2. vN/churn_gbt.json, vN/churn_logreg.json
//   3. vN/metrics.csv
//   4. latest_version.json → N   (only once all of the above exist)

use anyhow::Result;

use crate::application::train_use_case::TrainConfig;
use crate::data::dataset::FeatureMatrix;
use crate::domain::prediction::{ModelKind, Threshold};
use crate::domain::schema::FeatureSchema;
use crate::domain::traits::ChurnModel;
use crate::infra::checkpoint::ArtifactStore;
use crate::infra::metrics::{EvalMetrics, MetricsLogger};
use crate::ml::boosting::train_boosted;
use crate::ml::evaluation::evaluate;
use crate::ml::logistic::train_logistic;

/// The three processed splits, already checked against `schema`.
pub struct TrainingData {
    pub schema: FeatureSchema,
    pub train:  FeatureMatrix,
    pub val:    FeatureMatrix,
    pub test:   FeatureMatrix,
}

#[derive(Debug)]
pub struct TrainOutcome {
    pub version: u32,
    pub metrics: Vec<EvalMetrics>,
}

pub fn run_training(cfg: &TrainConfig, data: &TrainingData, store: &ArtifactStore) -> Result<TrainOutcome> {
    let fingerprint = data.schema.fingerprint();
    let threshold   = Threshold::new(cfg.eval_threshold)?;

    tracing::info!(
        "Training on {} rows ({} churned), {} features",
        data.train.n_rows(),
        data.train.positives(),
        data.train.n_features(),
    );

    // ── Fit ───────────────────────────────────────────────────────────────────
    let gbt    = train_boosted(&cfg.gbt, &data.train, &fingerprint)?;
    let logreg = train_logistic(&cfg.logreg, &data.train, &fingerprint)?;

    // ── Persist ───────────────────────────────────────────────────────────────
    let version = store.create_version()?;
    store.save_schema(version, &data.schema)?;
    store.save_config(version, cfg)?;
    store.save_model(version, ModelKind::Gbt, &gbt)?;
    store.save_model(version, ModelKind::Logreg, &logreg)?;

    // ── Evaluate ──────────────────────────────────────────────────────────────
    let logger = MetricsLogger::new(store.metrics_path(version))?;
    let models: [&dyn ChurnModel; 2] = [&gbt, &logreg];
    let mut metrics = Vec::new();

    for model in models {
        for (split, matrix) in [("val", &data.val), ("test", &data.test)] {
            if matrix.n_rows() == 0 {
                tracing::warn!("{split} split is empty, skipping evaluation of {}", model.kind());
                continue;
            }
            let m = EvalMetrics::new(model.kind(), split, evaluate(model, matrix, threshold));
            logger.log(&m)?;
            metrics.push(m);
        }
    }

    store.mark_latest(version)?;
    tracing::info!("Saved model version v{} under '{}'", version, store.dir().display());

    Ok(TrainOutcome { version, metrics })
}
