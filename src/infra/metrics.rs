// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records evaluation metrics to a CSV file, one row per
// (model, split) pair.
//
// Example CSV output:
//   model,split,rows,logloss,auc,accuracy,precision,recall
//   gbt,val,1500,0.412300,0.781200,0.801300,0.523100,0.611000
//   gbt,test,1500,0.420100,0.770400,0.795300,0.510900,0.598700
//   logreg,val,...

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::prediction::ModelKind;
use crate::ml::evaluation::EvalReport;

const HEADER: &str = "model,split,rows,logloss,auc,accuracy,precision,recall";

/// One row of the metrics file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub model:  ModelKind,
    /// "val" or "test"
    pub split:  String,
    pub report: EvalReport,
}

impl EvalMetrics {
    pub fn new(model: ModelKind, split: impl Into<String>, report: EvalReport) -> Self {
        Self { model, split: split.into(), report }
    }

    fn csv_row(&self) -> String {
        let r = &self.report;
        format!(
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.model, self.split, r.rows, r.logloss, r.auc, r.accuracy, r.precision, r.recall,
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file does not exist yet.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(dir) = csv_path.parent() {
            fs::create_dir_all(dir)?;
        }
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvalMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::info!(
            "{} [{}] logloss={:.4} auc={:.4} acc={:.4} precision={:.4} recall={:.4}",
            m.model,
            m.split,
            m.report.logloss,
            m.report.auc,
            m.report.accuracy,
            m.report.precision,
            m.report.recall,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> EvalReport {
        EvalReport { rows: 10, logloss: 0.5, auc: 0.75, accuracy: 0.8, precision: 0.6, recall: 0.4 }
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1").join("metrics.csv");

        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&EvalMetrics::new(ModelKind::Gbt, "val", report())).unwrap();
        // reopening must not duplicate the header
        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&EvalMetrics::new(ModelKind::Logreg, "test", report())).unwrap();

        let body = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "gbt,val,10,0.500000,0.750000,0.800000,0.600000,0.400000");
        assert!(lines[2].starts_with("logreg,test,10,"));
    }
}
