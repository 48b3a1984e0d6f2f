// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run over a processed directory:
//
//   Step 1: Load feature_schema.json         (Layer 6 - infra)
//   Step 2: Load train/val/test parquet      (Layer 4 - data)
//   Step 3: Check columns, build matrices    (Layer 4 - data)
//   Step 4: Fit, evaluate, save a version    (Layer 5 - ml)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::dataset::FeatureMatrix;
use crate::data::loader::read_parquet;
use crate::domain::prediction::DEFAULT_THRESHOLD;
use crate::domain::schema::FeatureSchema;
use crate::infra::checkpoint::{read_json, ArtifactStore, SCHEMA_FILE};
use crate::ml::boosting::GbtConfig;
use crate::ml::logistic::LogisticConfig;
use crate::ml::trainer::{run_training, TrainOutcome, TrainingData};

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved next to the artifacts as train_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:       PathBuf,
    pub model_dir:      PathBuf,
    /// Threshold used for accuracy / precision / recall in the report.
    pub eval_threshold: f64,
    pub gbt:            GbtConfig,
    pub logreg:         LogisticConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data/processed"),
            model_dir:      PathBuf::from("data/models"),
            eval_threshold: DEFAULT_THRESHOLD,
            gbt:            GbtConfig::default(),
            logreg:         LogisticConfig::default(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: frozen schema ─────────────────────────────────────────────
        let schema_path = cfg.data_dir.join(SCHEMA_FILE);
        let schema: FeatureSchema = read_json(&schema_path)
            .with_context(|| format!("Run 'process' first: no schema at '{}'", schema_path.display()))?;
        schema.check_definition()?;

        // ── Steps 2-3: splits as matrices ─────────────────────────────────────
        let train = load_split(&cfg.data_dir, "train", &schema)?;
        let val   = load_split(&cfg.data_dir, "val", &schema)?;
        let test  = load_split(&cfg.data_dir, "test", &schema)?;

        // ── Step 4: training run ──────────────────────────────────────────────
        let store = ArtifactStore::new(&cfg.model_dir);
        run_training(cfg, &TrainingData { schema, train, val, test }, &store)
    }
}

fn load_split(dir: &Path, name: &str, schema: &FeatureSchema) -> Result<FeatureMatrix> {
    let path  = dir.join(format!("{name}.parquet"));
    let table = read_parquet(&path)?;
    let m = FeatureMatrix::from_table(&table, schema)
        .with_context(|| format!("'{}' does not match the processed schema", path.display()))?;
    tracing::info!("Loaded {name} split: {} rows x {} features", m.n_rows(), m.n_features());
    Ok(m)
}
