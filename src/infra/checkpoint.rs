// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Versioned storage for everything a trained run produces.
//
// What gets saved per version:
//   1. feature_schema.json  — the frozen schema
//   2. churn_gbt.json       — boosted trees
//   3. churn_logreg.json    — logistic regression
//   4. train_config.json    — hyper-parameters of the run
//   5. metrics.csv          — validation / test metrics
//
// File layout:
//   models/
//     v1/ ...
//     v2/ ...
//     latest_version.json   ← number of the newest complete version
//
// latest_version.json is written last, so a crashed run never
// becomes the default version.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::application::train_use_case::TrainConfig;
use crate::domain::prediction::ModelKind;
use crate::domain::schema::FeatureSchema;

pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const CONFIG_FILE: &str = "train_config.json";
pub const METRICS_FILE: &str = "metrics.csv";
const LATEST_FILE: &str = "latest_version.json";

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version_dir(&self, version: u32) -> PathBuf {
        self.dir.join(format!("v{version}"))
    }

    /// Existing version numbers, ascending.
    pub fn versions(&self) -> Result<Vec<u32>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir).with_context(|| format!("Cannot read '{}'", self.dir.display()))? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(v) = name.to_str().and_then(|n| n.strip_prefix('v')).and_then(|n| n.parse().ok()) {
                out.push(v);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Create the directory for the next version number.
    pub fn create_version(&self) -> Result<u32> {
        let version = self.versions()?.last().map_or(1, |v| v + 1);
        let dir = self.version_dir(version);
        fs::create_dir_all(&dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;
        tracing::debug!("Created artifact version {}", version);
        Ok(version)
    }

    pub fn mark_latest(&self, version: u32) -> Result<()> {
        write_json(&self.dir.join(LATEST_FILE), &version)
    }

    pub fn latest_version(&self) -> Result<u32> {
        let path = self.dir.join(LATEST_FILE);
        read_json(&path).with_context(|| {
            format!("No trained model under '{}'. Have you run 'train' first?", self.dir.display())
        })
    }

    /// The requested version, or the latest one.
    pub fn resolve(&self, version: Option<u32>) -> Result<u32> {
        match version {
            Some(v) => {
                if !self.version_dir(v).is_dir() {
                    bail!("Model version v{v} not found under '{}'", self.dir.display());
                }
                Ok(v)
            }
            None => self.latest_version(),
        }
    }

    pub fn save_schema(&self, version: u32, schema: &FeatureSchema) -> Result<()> {
        write_json(&self.version_dir(version).join(SCHEMA_FILE), schema)
    }

    pub fn load_schema(&self, version: u32) -> Result<FeatureSchema> {
        let schema: FeatureSchema = read_json(&self.version_dir(version).join(SCHEMA_FILE))?;
        schema.check_definition()?;
        Ok(schema)
    }

    pub fn save_model<T: Serialize>(&self, version: u32, kind: ModelKind, artifact: &T) -> Result<()> {
        write_json(&self.version_dir(version).join(kind.artifact_file()), artifact)
    }

    pub fn load_model<T: DeserializeOwned>(&self, version: u32, kind: ModelKind) -> Result<T> {
        read_json(&self.version_dir(version).join(kind.artifact_file()))
    }

    pub fn save_config(&self, version: u32, cfg: &TrainConfig) -> Result<()> {
        write_json(&self.version_dir(version).join(CONFIG_FILE), cfg)
    }

    pub fn load_config(&self, version: u32) -> Result<TrainConfig> {
        read_json(&self.version_dir(version).join(CONFIG_FILE))
    }

    pub fn metrics_path(&self, version: u32) -> PathBuf {
        self.version_dir(version).join(METRICS_FILE)
    }
}

/// Pretty JSON, parent directories created on demand.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::FieldSpec;

    #[test]
    fn test_versions_increment_and_latest_is_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        assert!(store.latest_version().is_err());

        assert_eq!(store.create_version().unwrap(), 1);
        assert_eq!(store.create_version().unwrap(), 2);
        // v2 exists but was never marked complete
        store.mark_latest(1).unwrap();
        assert_eq!(store.resolve(None).unwrap(), 1);
        assert_eq!(store.resolve(Some(2)).unwrap(), 2);
        assert!(store.resolve(Some(7)).is_err());
        assert_eq!(store.versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_schema_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let v = store.create_version().unwrap();
        let schema = FeatureSchema::new("churned_14d", vec![FieldSpec::numeric("sessions_7d")]).unwrap();
        store.save_schema(v, &schema).unwrap();
        assert_eq!(store.load_schema(v).unwrap(), schema);
    }

    #[test]
    fn test_missing_model_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let v = store.create_version().unwrap();
        let res: Result<serde_json::Value> = store.load_model(v, ModelKind::Gbt);
        assert!(res.is_err());
    }

    #[test]
    fn test_non_version_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("vx")).unwrap();
        fs::create_dir(dir.path().join("scratch")).unwrap();
        fs::write(dir.path().join("v9"), "not a dir").unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.versions().unwrap().is_empty());
    }
}
