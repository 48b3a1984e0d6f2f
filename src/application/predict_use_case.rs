// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// One scoring request, shared by the CLI and the web demo:
//
//   Step 1: Resolve model selector and threshold (or defaults)
//   Step 2: Optionally apply the activity-profile fixes
//   Step 3: Validate against the schema and score
//
// Selector and threshold arrive as raw values so a bad one
// surfaces as a ScoringError, not a deserialisation failure.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ScoringError;
use crate::domain::prediction::{ChurnPrediction, ModelKind, Threshold};
use crate::domain::profile::{normalize_profile, ProfileFix};
use crate::domain::record::FeatureRecord;
use crate::infra::checkpoint::ArtifactStore;
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub features:  FeatureRecord,
    #[serde(default)]
    pub model:     Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub autofix:   Option<bool>,
}

impl PredictRequest {
    pub fn new(features: FeatureRecord) -> Self {
        Self { features, model: None, threshold: None, autofix: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictOutcome {
    #[serde(flatten)]
    pub prediction: ChurnPrediction,
    pub fixes:      Vec<ProfileFix>,
}

pub struct PredictUseCase {
    inferencer:        Arc<Inferencer>,
    default_model:     ModelKind,
    default_threshold: Threshold,
}

impl PredictUseCase {
    pub fn new(inferencer: Arc<Inferencer>, default_model: ModelKind, default_threshold: Threshold) -> Self {
        Self { inferencer, default_model, default_threshold }
    }

    /// Load `version` (latest when `None`) from `model_dir`.
    pub fn load(
        model_dir:         &Path,
        version:           Option<u32>,
        default_model:     ModelKind,
        default_threshold: Threshold,
    ) -> Result<Self> {
        let inferencer = Inferencer::load(&ArtifactStore::new(model_dir), version)?;
        Ok(Self::new(Arc::new(inferencer), default_model, default_threshold))
    }

    pub fn inferencer(&self) -> &Inferencer {
        &self.inferencer
    }

    pub fn predict(&self, request: PredictRequest) -> Result<PredictOutcome, ScoringError> {
        // ── Step 1 ────────────────────────────────────────────────────────────
        let model = match request.model.as_deref() {
            Some(s) => s.parse()?,
            None => self.default_model,
        };
        let threshold = match request.threshold {
            Some(t) => Threshold::new(t)?,
            None => self.default_threshold,
        };

        // ── Step 2 ────────────────────────────────────────────────────────────
        let mut record = request.features;
        let fixes = if request.autofix.unwrap_or(true) {
            normalize_profile(&mut record)
        } else {
            Vec::new()
        };

        // ── Step 3 ────────────────────────────────────────────────────────────
        let prediction = self.inferencer.score(&record, model, threshold)?;
        tracing::debug!(
            "{} p={:.4} t={} churn={} ({} fixes)",
            prediction.model,
            prediction.churn_probability,
            prediction.threshold,
            prediction.churn_prediction,
            fixes.len(),
        );

        Ok(PredictOutcome { prediction, fixes })
    }
}
