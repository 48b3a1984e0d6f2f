// ============================================================
// Layer 4 — Feature Matrix & Burn Dataset
// ============================================================
// FeatureMatrix: dense rows in schema column order plus labels,
//                shared by both model families.
// ChurnDataset:  burn Dataset over weighted f32 samples, used
//                by the logistic-regression DataLoader.

use anyhow::{bail, Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::{DATE_COL, ID_COL};
use crate::data::table::Table;
use crate::domain::schema::FeatureSchema;

// ─── FeatureMatrix ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<f64>>,
    /// 0.0 or 1.0
    pub labels:  Vec<f64>,
}

impl FeatureMatrix {
    /// Pull the schema's encoded columns out of a processed table.
    /// The table's feature columns (everything but id, date and
    /// label) must equal the schema columns, in order.
    pub fn from_table(table: &Table, schema: &FeatureSchema) -> Result<Self> {
        let present: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|c| *c != ID_COL && *c != DATE_COL && *c != schema.label)
            .map(String::from)
            .collect();
        schema.check_columns(&present)?;

        let labels: Vec<f64> = table
            .numeric(&schema.label)
            .with_context(|| format!("label column '{}' missing or not numeric", schema.label))?
            .iter()
            .map(|v| match v {
                Some(y) if *y > 0.0 => 1.0,
                _ => 0.0,
            })
            .collect();

        let mut rows = vec![Vec::with_capacity(present.len()); table.n_rows()];
        for name in &present {
            let values = table
                .numeric(name)
                .with_context(|| format!("feature column '{name}' is not numeric"))?;
            for (row, v) in rows.iter_mut().zip(values) {
                match v {
                    Some(x) if x.is_finite() => row.push(*x),
                    _ => bail!("feature column '{name}' has null or non-finite values"),
                }
            }
        }

        Ok(Self { columns: present, rows, labels })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y > 0.5).count()
    }
}

/// `n / (2 * count)` per class, so both classes carry equal total weight.
/// A missing class gets weight 1.
pub fn balanced_weights(labels: &[f64]) -> (f64, f64) {
    let n   = labels.len() as f64;
    let pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
    let neg = n - pos;
    let w = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
    (w(neg), w(pos))
}

// ─── ChurnSample / ChurnDataset ───────────────────────────────────────────────
/// One training row for the burn model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnSample {
    pub features: Vec<f32>,
    pub label:    f32,
    pub weight:   f32,
}

pub struct ChurnDataset {
    samples: Vec<ChurnSample>,
}

impl ChurnDataset {
    pub fn new(samples: Vec<ChurnSample>) -> Self {
        Self { samples }
    }

    /// Samples with balanced class weights. `scale` divides each
    /// feature column; pass all ones to leave values untouched.
    pub fn from_matrix(matrix: &FeatureMatrix, scale: &[f64]) -> Self {
        let (w_neg, w_pos) = balanced_weights(&matrix.labels);
        let samples = matrix
            .rows
            .iter()
            .zip(&matrix.labels)
            .map(|(row, &y)| ChurnSample {
                features: row.iter().zip(scale).map(|(x, s)| (x / s) as f32).collect(),
                label:    y as f32,
                weight:   (if y > 0.5 { w_pos } else { w_neg }) as f32,
            })
            .collect();
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<ChurnSample> for ChurnDataset {
    fn get(&self, index: usize) -> Option<ChurnSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;
    use crate::domain::schema::FieldSpec;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            "churned_14d",
            vec![FieldSpec::numeric("sessions_7d"), FieldSpec::categorical("plan", ["a", "b"])],
        )
        .unwrap()
    }

    fn table() -> Table {
        Table::from_columns(vec![
            Column::text("user_id", vec![Some("u1".into()), Some("u2".into())]),
            Column::text("obs_end_date", vec![Some("2024-01-01".into()), Some("2024-01-02".into())]),
            Column::numeric("churned_14d", vec![Some(1.0), Some(0.0)]),
            Column::numeric("sessions_7d", vec![Some(3.0), Some(0.0)]),
            Column::numeric("plan_b", vec![Some(0.0), Some(1.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_matrix_follows_schema_columns() {
        let m = FeatureMatrix::from_table(&table(), &schema()).unwrap();
        assert_eq!(m.columns, vec!["sessions_7d", "plan_b"]);
        assert_eq!(m.rows, vec![vec![3.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(m.labels, vec![1.0, 0.0]);
        assert_eq!(m.positives(), 1);
    }

    #[test]
    fn test_matrix_rejects_column_drift() {
        let mut t = table();
        t.drop_column("plan_b");
        assert!(FeatureMatrix::from_table(&t, &schema()).is_err());

        let mut t = table();
        t.set_column(Column::numeric("sessions_7d", vec![Some(1.0), None])).unwrap();
        assert!(FeatureMatrix::from_table(&t, &schema()).is_err());
    }

    #[test]
    fn test_balanced_weights() {
        let (w0, w1) = balanced_weights(&[0.0, 0.0, 0.0, 1.0]);
        assert!((w0 - 4.0 / 6.0).abs() < 1e-12);
        assert!((w1 - 2.0).abs() < 1e-12);
        // both classes end up with equal total weight
        assert!((3.0 * w0 - w1).abs() < 1e-12);
        assert_eq!(balanced_weights(&[0.0, 0.0]), (0.5, 1.0));
    }

    #[test]
    fn test_dataset_scales_and_weights() {
        let m = FeatureMatrix::from_table(&table(), &schema()).unwrap();
        let ds = ChurnDataset::from_matrix(&m, &[2.0, 1.0]);
        assert_eq!(ds.len(), 2);
        let first = ds.get(0).unwrap();
        assert_eq!(first.features, vec![1.5, 0.0]);
        assert_eq!(first.label, 1.0);
        assert_eq!(first.weight, 1.0);
        assert!(ds.get(2).is_none());
    }
}
