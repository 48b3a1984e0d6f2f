// ============================================================
// Layer 3 — Feature Records
// ============================================================
// What a caller hands to the scorer:
//   - FeatureRecord: named raw values, e.g. {"plan": "A", "sessions": 5}
//   - EncodedRow:    an already one-hot encoded, positional row
//
// Neither type knows the schema; FeatureSchema checks them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{SchemaIssue, SchemaMismatch};

/// A single raw input value.
/// Untagged so plain JSON numbers and strings deserialise directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A named record of raw feature values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FeatureValue::as_number)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FeatureValue>> FromIterator<(K, V)> for FeatureRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Build a record from an arbitrary JSON object.
/// Only numbers and strings are feature values; `null`, booleans,
/// arrays and objects are reported per field.
impl TryFrom<Map<String, Value>> for FeatureRecord {
    type Error = SchemaMismatch;

    fn try_from(object: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut values = BTreeMap::new();
        let mut issues = Vec::new();
        for (field, value) in object {
            let found = match value {
                Value::Number(n) => match n.as_f64() {
                    Some(v) => {
                        values.insert(field, FeatureValue::Number(v));
                        continue;
                    }
                    None => "unrepresentable number",
                },
                Value::String(s) => {
                    values.insert(field, FeatureValue::Text(s));
                    continue;
                }
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            };
            issues.push(SchemaIssue::TypeMismatch { field, expected: "number or text", found });
        }
        SchemaMismatch::check(issues)?;
        Ok(Self { values })
    }
}

/// A positional, already encoded row.
/// `columns[i]` names the meaning of `values[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    pub columns: Vec<String>,
    pub values:  Vec<f64>,
}

impl EncodedRow {
    pub fn new(columns: Vec<String>, values: Vec<f64>) -> Self {
        Self { columns, values }
    }
}
