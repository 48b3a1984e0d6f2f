// ============================================================
// Layer 3 — Feature Schema
// ============================================================
// The frozen contract between training and inference.
//
// A schema is an ordered list of fields. Each field is either
//   - Numeric:     passed through as one encoded column
//   - Categorical: one-hot encoded, drop-first. Categories are kept
//                  sorted; the first one is the baseline and has no
//                  column of its own (all dummies = 0).
//
// Example:
//   fields:  sessions:number, tokens:number, plan:{A,B}
//   columns: [sessions, tokens, plan_B]
//
// The schema is created once when the processed layer is written,
// copied next to every trained artifact, and never edited. Models
// remember the schema fingerprint they were fitted against.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::error::{SchemaIssue, SchemaMismatch};
use crate::domain::record::{EncodedRow, FeatureRecord, FeatureValue};

/// Bumped whenever the on-disk layout of the schema changes.
pub const SCHEMA_FORMAT_VERSION: u32 = 1;

/// Min / max seen in the training data. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedRange {
    pub min: f64,
    pub max: f64,
}

/// How a field is typed and encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric {
        #[serde(default)]
        integer: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observed: Option<ObservedRange>,
    },
    Categorical {
        categories: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    /// An unbounded, real-valued field.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric { integer: false, min: None, max: None, observed: None },
        }
    }

    /// A categorical field. Categories are sorted and de-duplicated.
    pub fn categorical<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        categories.sort();
        categories.dedup();
        Self { name: name.into(), kind: FieldKind::Categorical { categories } }
    }

    /// Require whole-number values. No-op on categorical fields.
    pub fn integer(mut self) -> Self {
        if let FieldKind::Numeric { integer, .. } = &mut self.kind {
            *integer = true;
        }
        self
    }

    /// Enforce inclusive bounds. No-op on categorical fields.
    pub fn bounded(mut self, lo: Option<f64>, hi: Option<f64>) -> Self {
        if let FieldKind::Numeric { min, max, .. } = &mut self.kind {
            *min = lo;
            *max = hi;
        }
        self
    }

    pub fn with_observed(mut self, range: Option<ObservedRange>) -> Self {
        if let FieldKind::Numeric { observed, .. } = &mut self.kind {
            *observed = range;
        }
        self
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FieldKind::Categorical { .. })
    }

    /// Names of the encoded columns this field contributes.
    pub fn encoded_columns(&self) -> Vec<String> {
        match &self.kind {
            FieldKind::Numeric { .. } => vec![self.name.clone()],
            FieldKind::Categorical { categories } => categories
                .iter()
                .skip(1)
                .map(|c| dummy_column(&self.name, c))
                .collect(),
        }
    }

    /// Validate one value, appending every problem to `issues`.
    fn check_value(&self, value: &FeatureValue, issues: &mut Vec<SchemaIssue>) {
        match (&self.kind, value) {
            (FieldKind::Numeric { integer, min, max, .. }, FeatureValue::Number(v)) => {
                let v = *v;
                if !v.is_finite() {
                    issues.push(SchemaIssue::NonFinite { field: self.name.clone() });
                    return;
                }
                if *integer && v.fract() != 0.0 {
                    issues.push(SchemaIssue::NotInteger { field: self.name.clone(), value: v });
                }
                let below = min.is_some_and(|lo| v < lo);
                let above = max.is_some_and(|hi| v > hi);
                if below || above {
                    issues.push(SchemaIssue::OutOfRange {
                        field: self.name.clone(),
                        value: v,
                        min:   *min,
                        max:   *max,
                    });
                }
            }
            (FieldKind::Categorical { categories }, FeatureValue::Text(s)) => {
                if !categories.iter().any(|c| c == s) {
                    issues.push(SchemaIssue::UnknownCategory {
                        field:   self.name.clone(),
                        value:   s.clone(),
                        allowed: categories.clone(),
                    });
                }
            }
            (FieldKind::Numeric { .. }, other) => issues.push(SchemaIssue::TypeMismatch {
                field:    self.name.clone(),
                expected: "number",
                found:    other.type_name(),
            }),
            (FieldKind::Categorical { .. }, other) => issues.push(SchemaIssue::TypeMismatch {
                field:    self.name.clone(),
                expected: "category",
                found:    other.type_name(),
            }),
        }
    }

    /// Append the encoded columns for an already validated value.
    fn encode_into(&self, value: &FeatureValue, out: &mut Vec<f64>) {
        match (&self.kind, value) {
            (FieldKind::Numeric { .. }, FeatureValue::Number(v)) => out.push(*v),
            (FieldKind::Categorical { categories }, FeatureValue::Text(s)) => {
                out.extend(categories.iter().skip(1).map(|c| if c == s { 1.0 } else { 0.0 }));
            }
            // unreachable after validation; keep the width stable regardless
            _ => out.extend(std::iter::repeat(0.0).take(self.encoded_columns().len())),
        }
    }
}

/// `{field}_{category}`, matching the processed-layer dummy columns.
pub fn dummy_column(field: &str, category: &str) -> String {
    format!("{field}_{category}")
}

/// A schema that is internally inconsistent and cannot be frozen.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaDefinitionError {
    #[error("schema has no fields")]
    Empty,

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("categorical field '{0}' has no categories")]
    EmptyCategories(String),

    #[error("encoded column '{0}' is produced by more than one field")]
    ColumnCollision(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub format_version: u32,
    /// Name of the training label column; never a feature.
    pub label:          String,
    pub fields:         Vec<FieldSpec>,
    pub created_at:     DateTime<Utc>,
}

impl FeatureSchema {
    pub fn new(label: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self, SchemaDefinitionError> {
        let schema = Self {
            format_version: SCHEMA_FORMAT_VERSION,
            label:          label.into(),
            fields,
            created_at:     Utc::now(),
        };
        schema.check_definition()?;
        Ok(schema)
    }

    /// Re-check invariants, e.g. after loading from disk.
    pub fn check_definition(&self) -> Result<(), SchemaDefinitionError> {
        if self.fields.is_empty() {
            return Err(SchemaDefinitionError::Empty);
        }
        let mut names = HashSet::new();
        for f in &self.fields {
            if !names.insert(f.name.as_str()) {
                return Err(SchemaDefinitionError::DuplicateField(f.name.clone()));
            }
            if let FieldKind::Categorical { categories } = &f.kind {
                if categories.is_empty() {
                    return Err(SchemaDefinitionError::EmptyCategories(f.name.clone()));
                }
            }
        }
        let mut columns = HashSet::new();
        for c in self.encoded_columns() {
            if !columns.insert(c.clone()) {
                return Err(SchemaDefinitionError::ColumnCollision(c));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The dense column list fed to every model, in order.
    pub fn encoded_columns(&self) -> Vec<String> {
        self.fields.iter().flat_map(FieldSpec::encoded_columns).collect()
    }

    pub fn encoded_width(&self) -> usize {
        self.encoded_columns().len()
    }

    /// SHA-256 over the contract: names, kinds, bounds, categories and
    /// encoded columns. Observed ranges and the creation time are excluded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.label.as_bytes());
        for f in &self.fields {
            hasher.update(b"\x1f");
            hasher.update(f.name.as_bytes());
            match &f.kind {
                FieldKind::Numeric { integer, min, max, .. } => {
                    hasher.update(format!(":numeric:{integer}:{min:?}:{max:?}").as_bytes());
                }
                FieldKind::Categorical { categories } => {
                    hasher.update(b":categorical:");
                    hasher.update(categories.join("\x1e").as_bytes());
                }
            }
        }
        hasher.update(b"\x1d");
        hasher.update(self.encoded_columns().join("\x1e").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a named record against the schema.
    /// Missing fields are reported, never filled.
    pub fn validate(&self, record: &FeatureRecord) -> Result<(), SchemaMismatch> {
        let mut issues = Vec::new();
        for f in &self.fields {
            match record.get(&f.name) {
                Some(value) => f.check_value(value, &mut issues),
                None => issues.push(SchemaIssue::MissingField { field: f.name.clone() }),
            }
        }
        for name in record.names() {
            if self.field(name).is_none() {
                issues.push(SchemaIssue::UnexpectedField { field: name.to_string() });
            }
        }
        SchemaMismatch::check(issues)
    }

    /// Validate and encode a named record into model input order.
    pub fn encode(&self, record: &FeatureRecord) -> Result<Vec<f64>, SchemaMismatch> {
        self.validate(record)?;
        let mut out = Vec::with_capacity(self.encoded_width());
        for f in &self.fields {
            if let Some(value) = record.get(&f.name) {
                f.encode_into(value, &mut out);
            }
        }
        Ok(out)
    }

    /// Position-by-position comparison of a column list with the schema.
    pub fn check_columns(&self, columns: &[String]) -> Result<(), SchemaMismatch> {
        let expected = self.encoded_columns();
        if expected.len() != columns.len() {
            // still report the first misplaced column, it usually names the culprit
            let mut issues = vec![SchemaIssue::ColumnCount {
                expected: expected.len(),
                found:    columns.len(),
            }];
            if let Some((position, (e, f))) = expected
                .iter()
                .zip(columns.iter())
                .enumerate()
                .find(|(_, (e, f))| e != f)
            {
                issues.push(SchemaIssue::ColumnOrder {
                    position,
                    expected: e.clone(),
                    found:    f.clone(),
                });
            }
            return Err(SchemaMismatch::new(issues));
        }
        let issues = expected
            .iter()
            .zip(columns.iter())
            .enumerate()
            .filter(|(_, (e, f))| e != f)
            .map(|(position, (e, f))| SchemaIssue::ColumnOrder {
                position,
                expected: e.clone(),
                found:    f.clone(),
            })
            .collect();
        SchemaMismatch::check(issues)
    }

    /// Check an already encoded row and hand back its values.
    pub fn check_encoded(&self, row: &EncodedRow) -> Result<Vec<f64>, SchemaMismatch> {
        self.check_columns(&row.columns)?;
        if row.values.len() != row.columns.len() {
            return Err(SchemaMismatch::single(SchemaIssue::ColumnCount {
                expected: row.columns.len(),
                found:    row.values.len(),
            }));
        }
        let issues: Vec<SchemaIssue> = row
            .columns
            .iter()
            .zip(row.values.iter())
            .filter(|(_, v)| !v.is_finite())
            .map(|(c, _)| SchemaIssue::NonFinite { field: c.clone() })
            .collect();
        SchemaMismatch::check(issues)?;
        Ok(row.values.clone())
    }

    /// Compare a fingerprint stored in an artifact with this schema.
    pub fn check_fingerprint(&self, artifact: &str, found: &str) -> Result<(), SchemaMismatch> {
        let expected = self.fingerprint();
        if expected == found {
            Ok(())
        } else {
            Err(SchemaMismatch::single(SchemaIssue::FingerprintMismatch {
                artifact: artifact.to_string(),
                expected,
                found: found.to_string(),
            }))
        }
    }
}
