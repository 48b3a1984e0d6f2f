// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads one artifact version (schema + models) and scores
// records against it.
//
// Load-time checks, per model:
//   - stored fingerprint == schema fingerprint
//   - stored column list == schema encoded columns
//   - coefficients / tree links line up with that column list
// A model failing any of them is never served.
//
// Score-time checks: the record is validated and encoded by the
// schema; missing, extra, mistyped or out-of-range fields reject
// the call before any model runs.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::domain::error::{ScoringError, SchemaMismatch};
use crate::domain::prediction::{ChurnPrediction, ModelKind, Threshold};
use crate::domain::record::{EncodedRow, FeatureRecord};
use crate::domain::schema::FeatureSchema;
use crate::domain::traits::ChurnModel;
use crate::infra::checkpoint::ArtifactStore;
use crate::ml::boosting::BoostedArtifact;
use crate::ml::logistic::LogisticArtifact;

pub struct Inferencer {
    version: u32,
    schema:  FeatureSchema,
    models:  BTreeMap<ModelKind, Box<dyn ChurnModel>>,
}

impl std::fmt::Debug for Inferencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inferencer")
            .field("version", &self.version)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Inferencer {
    /// Load `version` (latest when `None`) from the store.
    /// Model files that are absent are skipped; at least one must exist.
    pub fn load(store: &ArtifactStore, version: Option<u32>) -> Result<Self> {
        let version = store.resolve(version)?;
        let schema  = store.load_schema(version)?;

        let mut models: Vec<Box<dyn ChurnModel>> = Vec::new();
        for kind in ModelKind::ALL {
            let path = store.version_dir(version).join(kind.artifact_file());
            if !path.exists() {
                tracing::warn!("v{version}: {} not found, model '{kind}' unavailable", kind.artifact_file());
                continue;
            }
            let model: Box<dyn ChurnModel> = match kind {
                ModelKind::Gbt => Box::new(store.load_model::<BoostedArtifact>(version, kind)?),
                ModelKind::Logreg => Box::new(store.load_model::<LogisticArtifact>(version, kind)?),
            };
            models.push(model);
        }
        if models.is_empty() {
            bail!("Model version v{version} contains no model artifacts");
        }

        let inferencer = Self::from_parts(version, schema, models)
            .with_context(|| format!("Artifacts of v{version} do not match their schema"))?;
        tracing::info!(
            "Loaded model version v{} ({:?}), {} encoded features",
            version,
            inferencer.available(),
            inferencer.schema.encoded_width(),
        );
        Ok(inferencer)
    }

    /// Assemble from in-memory parts, running the load-time checks.
    pub fn from_parts(
        version: u32,
        schema:  FeatureSchema,
        models:  Vec<Box<dyn ChurnModel>>,
    ) -> Result<Self, SchemaMismatch> {
        let mut map = BTreeMap::new();
        for model in models {
            schema.check_fingerprint(model.kind().artifact_file(), model.schema_fingerprint())?;
            schema.check_columns(model.columns())?;
            model.check_shape()?;
            map.insert(model.kind(), model);
        }
        Ok(Self { version, schema, models: map })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn available(&self) -> Vec<ModelKind> {
        self.models.keys().copied().collect()
    }

    fn model(&self, kind: ModelKind) -> Result<&dyn ChurnModel, ScoringError> {
        self.models
            .get(&kind)
            .map(|m| m.as_ref())
            .ok_or_else(|| ScoringError::ModelUnavailable(kind.to_string()))
    }

    /// Validate, encode and score a named record.
    pub fn score(
        &self,
        record:    &FeatureRecord,
        kind:      ModelKind,
        threshold: Threshold,
    ) -> Result<ChurnPrediction, ScoringError> {
        let model    = self.model(kind)?;
        let features = self.schema.encode(record)?;
        ChurnPrediction::new(kind, model.predict_proba(&features), threshold)
    }

    /// Score a row that is already one-hot encoded.
    pub fn score_encoded(
        &self,
        row:       &EncodedRow,
        kind:      ModelKind,
        threshold: Threshold,
    ) -> Result<ChurnPrediction, ScoringError> {
        let model    = self.model(kind)?;
        let features = self.schema.check_encoded(row)?;
        ChurnPrediction::new(kind, model.predict_proba(&features), threshold)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::error::SchemaIssue;
    use crate::domain::schema::FieldSpec;
    use crate::ml::boosting::{Node, Tree};
    use proptest::prelude::*;

    pub(crate) fn plan_schema() -> FeatureSchema {
        FeatureSchema::new(
            "churned_14d",
            vec![
                FieldSpec::numeric("sessions"),
                FieldSpec::numeric("tokens"),
                FieldSpec::categorical("plan", ["A", "B"]),
            ],
        )
        .unwrap()
    }

    pub(crate) fn logistic_for(schema: &FeatureSchema) -> LogisticArtifact {
        LogisticArtifact {
            schema_fingerprint: schema.fingerprint(),
            columns:            schema.encoded_columns(),
            scale:              vec![1.0, 100.0, 1.0],
            weights:            vec![-0.3, -0.2, 0.8],
            bias:               0.4,
        }
    }

    pub(crate) fn boosted_for(schema: &FeatureSchema) -> BoostedArtifact {
        BoostedArtifact {
            schema_fingerprint: schema.fingerprint(),
            columns:            schema.encoded_columns(),
            base_margin:        0.0,
            learning_rate:      1.0,
            trees: vec![Tree {
                nodes: vec![
                    Node::Split { feature: 0, threshold: 2.5, left: 1, right: 2 },
                    Node::Leaf { value: 1.5 },
                    Node::Leaf { value: -1.5 },
                ],
            }],
        }
    }

    pub(crate) fn inferencer() -> Inferencer {
        let schema = plan_schema();
        let models: Vec<Box<dyn ChurnModel>> =
            vec![Box::new(boosted_for(&schema)), Box::new(logistic_for(&schema))];
        Inferencer::from_parts(1, schema, models).unwrap()
    }

    fn full_record() -> FeatureRecord {
        FeatureRecord::new().with("sessions", 5.0).with("tokens", 10.0).with("plan", "A")
    }

    #[test]
    fn test_matching_record_scores_in_unit_interval() {
        let inf = inferencer();
        for kind in ModelKind::ALL {
            let p = inf.score(&full_record(), kind, Threshold::default()).unwrap();
            assert!((0.0..=1.0).contains(&p.churn_probability));
            assert_eq!(p.model, kind);
        }
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let inf = inferencer();
        let rec = FeatureRecord::new().with("sessions", 5.0).with("tokens", 10.0);
        match inf.score(&rec, ModelKind::Gbt, Threshold::default()) {
            Err(ScoringError::Schema(m)) => assert!(m.has_missing_field("plan")),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_encoded_row_with_shifted_columns_is_rejected() {
        let inf = inferencer();
        let row = EncodedRow::new(vec!["sessions".into(), "plan_B".into()], vec![5.0, 1.0]);
        let err = inf.score_encoded(&row, ModelKind::Logreg, Threshold::default()).unwrap_err();
        assert!(matches!(err, ScoringError::Schema(_)));

        let row = EncodedRow::new(inf.schema().encoded_columns(), vec![5.0, 10.0, 0.0]);
        let a = inf.score_encoded(&row, ModelKind::Logreg, Threshold::default()).unwrap();
        let b = inf.score(&full_record(), ModelKind::Logreg, Threshold::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stale_artifact_is_refused_at_load() {
        let schema = plan_schema();
        let mut stale = boosted_for(&schema);
        stale.schema_fingerprint = "0000".into();
        let models: Vec<Box<dyn ChurnModel>> = vec![Box::new(stale)];
        let err = Inferencer::from_parts(1, schema, models).unwrap_err();
        assert!(matches!(err.issues[0], SchemaIssue::FingerprintMismatch { .. }));
    }

    #[test]
    fn test_artifact_with_wrong_columns_is_refused() {
        let schema = plan_schema();
        let mut art = logistic_for(&schema);
        art.columns.swap(0, 1);
        let models: Vec<Box<dyn ChurnModel>> = vec![Box::new(art)];
        assert!(Inferencer::from_parts(1, schema, models).is_err());
    }

    #[test]
    fn test_truncated_coefficients_are_refused() {
        let schema = plan_schema();
        let mut art = logistic_for(&schema);
        art.weights.truncate(1);
        art.scale.truncate(1);
        let models: Vec<Box<dyn ChurnModel>> = vec![Box::new(art)];
        let err = Inferencer::from_parts(1, schema, models).unwrap_err();
        assert!(err.issues.iter().all(|i| matches!(i, SchemaIssue::MalformedArtifact { .. })));
    }

    #[test]
    fn test_split_on_missing_column_is_refused() {
        let schema = plan_schema();
        let mut art = boosted_for(&schema);
        art.trees[0].nodes[0] = Node::Split { feature: 3, threshold: 2.5, left: 1, right: 2 };
        let models: Vec<Box<dyn ChurnModel>> = vec![Box::new(art)];
        let err = Inferencer::from_parts(1, schema, models).unwrap_err();
        assert!(matches!(err.issues[0], SchemaIssue::MalformedArtifact { .. }));
    }

    #[test]
    fn test_unloaded_model_is_reported() {
        let schema = plan_schema();
        let only_gbt: Vec<Box<dyn ChurnModel>> = vec![Box::new(boosted_for(&schema))];
        let inf = Inferencer::from_parts(3, schema, only_gbt).unwrap();
        assert_eq!(inf.available(), vec![ModelKind::Gbt]);
        let err = inf.score(&full_record(), ModelKind::Logreg, Threshold::default()).unwrap_err();
        assert!(matches!(err, ScoringError::ModelUnavailable(_)));
    }

    #[test]
    fn test_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let schema = plan_schema();
        let v = store.create_version().unwrap();
        store.save_schema(v, &schema).unwrap();
        store.save_model(v, ModelKind::Gbt, &boosted_for(&schema)).unwrap();
        store.save_model(v, ModelKind::Logreg, &logistic_for(&schema)).unwrap();
        store.mark_latest(v).unwrap();

        let inf = Inferencer::load(&store, None).unwrap();
        assert_eq!(inf.version(), v);
        assert_eq!(inf.available(), ModelKind::ALL.to_vec());
    }

    proptest! {
        #[test]
        fn prop_identical_calls_give_identical_decisions(
            sessions in 0.0f64..50.0,
            tokens in 0.0f64..5000.0,
            plan_b in any::<bool>(),
            t in 0.0f64..=1.0,
        ) {
            let inf = inferencer();
            let rec = FeatureRecord::new()
                .with("sessions", sessions)
                .with("tokens", tokens)
                .with("plan", if plan_b { "B" } else { "A" });
            let threshold = Threshold::new(t).unwrap();
            for kind in ModelKind::ALL {
                let a = inf.score(&rec, kind, threshold).unwrap();
                let b = inf.score(&rec, kind, threshold).unwrap();
                prop_assert_eq!(a, b);
            }
        }
    }
}
