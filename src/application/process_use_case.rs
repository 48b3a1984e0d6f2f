// ============================================================
// Layer 2 — ProcessUseCase
// ============================================================
// Raw activity export → processed layer:
//
//   Step 1: Load the raw table              (Layer 4 - data)
//   Step 2: Feature engineering + schema    (Layer 4 - data)
//   Step 3: Chronological 70/15/15 split    (Layer 4 - data)
//   Step 4: Write parquet splits + schema   (Layer 4 / 6)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::data::loader::TableLoader;
use crate::data::preprocessor::Preprocessor;
use crate::data::splitter::time_split;
use crate::data::writer::write_parquet;
use crate::domain::traits::TableSource;
use crate::infra::checkpoint::{write_json, SCHEMA_FILE};

/// Row counts of what was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub train_rows: usize,
    pub val_rows:   usize,
    pub test_rows:  usize,
    pub features:   usize,
}

pub struct ProcessUseCase {
    input:      PathBuf,
    output_dir: PathBuf,
}

impl ProcessUseCase {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self { input: input.into(), output_dir: output_dir.into() }
    }

    pub fn execute(&self) -> Result<ProcessSummary> {
        // ── Step 1 ────────────────────────────────────────────────────────────
        tracing::info!("Reading raw data from '{}'", self.input.display());
        let raw = TableLoader::new(&self.input).load()?;
        tracing::info!("Raw shape: {:?}", raw.shape());

        // ── Step 2 ────────────────────────────────────────────────────────────
        let processed = Preprocessor::new().process(raw)?;

        // ── Step 3 ────────────────────────────────────────────────────────────
        let split = time_split(&processed.table, &processed.dates)?;

        // ── Step 4 ────────────────────────────────────────────────────────────
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Cannot create '{}'", self.output_dir.display()))?;
        for (name, table) in [("train", &split.train), ("val", &split.val), ("test", &split.test)] {
            write_parquet(table, &self.output_dir.join(format!("{name}.parquet")))?;
            tracing::info!("{name}: {:?}", table.shape());
        }
        write_json(&self.output_dir.join(SCHEMA_FILE), &processed.schema)?;
        tracing::info!(
            "Schema fingerprint {} written to '{}'",
            processed.schema.fingerprint(),
            self.output_dir.display()
        );

        Ok(ProcessSummary {
            train_rows: split.train.n_rows(),
            val_rows:   split.val.n_rows(),
            test_rows:  split.test.n_rows(),
            features:   processed.schema.encoded_width(),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::FeatureMatrix;
    use crate::data::loader::read_parquet;
    use crate::domain::schema::FeatureSchema;
    use crate::infra::checkpoint::read_json;
    use std::fmt::Write as _;

    /// 20 users over 20 days, written newest first.
    fn raw_csv() -> String {
        let mut body = String::from(
            "user_id,obs_end_date,churned_14d,tokens_per_session_7d,sessions_7d,active_days_7d,primary_model_7d,unsubscribe_ts\n",
        );
        for i in (0..20).rev() {
            let model = ["gpt-4o", "gpt-4.1", ""][i % 3];
            writeln!(
                body,
                "u{i},2024-01-{:02},{},{},{},{},{model},",
                i + 1,
                i % 2,
                i * 100,
                i % 5,
                (i % 5).min(3),
            )
            .unwrap();
        }
        body
    }

    #[test]
    fn test_process_writes_splits_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(&input, raw_csv()).unwrap();
        let out_dir = dir.path().join("processed");

        let summary = ProcessUseCase::new(&input, &out_dir).execute().unwrap();
        assert_eq!((summary.train_rows, summary.val_rows, summary.test_rows), (14, 3, 3));

        let schema: FeatureSchema = read_json(&out_dir.join(SCHEMA_FILE)).unwrap();
        assert_eq!(summary.features, schema.encoded_width());

        // every split lines up with the schema
        for name in ["train", "val", "test"] {
            let t = read_parquet(&out_dir.join(format!("{name}.parquet"))).unwrap();
            assert!(FeatureMatrix::from_table(&t, &schema).is_ok());
            assert!(!t.has_column("unsubscribe_ts"));
        }

        // oldest rows train, newest rows test
        let test = read_parquet(&out_dir.join("test.parquet")).unwrap();
        let dates = test.text("obs_end_date").unwrap();
        assert_eq!(dates.last().unwrap().as_deref(), Some("2024-01-20"));
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let res = ProcessUseCase::new(dir.path().join("none.csv"), dir.path().join("out")).execute();
        assert!(res.is_err());
    }
}
