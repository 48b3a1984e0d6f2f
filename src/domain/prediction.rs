// ============================================================
// Layer 3 — Prediction Types
// ============================================================
// Model selector, decision threshold and the scoring result.
//
// Decision rule: churn = probability >= threshold (inclusive).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ScoringError;

/// Default cut-off used by the CLI and the web demo.
pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Which trained model scores a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Gradient-boosted decision trees
    #[default]
    Gbt,
    /// Scaled logistic regression
    Logreg,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Gbt, ModelKind::Logreg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gbt => "gbt",
            Self::Logreg => "logreg",
        }
    }

    /// File name of the artifact inside a model version directory.
    pub fn artifact_file(&self) -> &'static str {
        match self {
            Self::Gbt => "churn_gbt.json",
            Self::Logreg => "churn_logreg.json",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gbt" | "gbdt" | "xgb" | "xgboost" => Ok(Self::Gbt),
            "logreg" | "logistic" => Ok(Self::Logreg),
            _ => Err(ScoringError::UnknownModel(s.to_string())),
        }
    }
}

/// A validated decision threshold in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ScoringError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoringError::InvalidThreshold(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Inclusive: a probability equal to the threshold is a churn decision.
    pub fn decide(&self, probability: f64) -> bool {
        probability >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        Threshold::new(v).map_err(serde::de::Error::custom)
    }
}

/// Result of one scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    pub churn_probability: f64,
    pub churn_prediction:  bool,
    pub threshold:         f64,
    pub model:             ModelKind,
}

impl ChurnPrediction {
    pub fn new(model: ModelKind, probability: f64, threshold: Threshold) -> Result<Self, ScoringError> {
        if !(probability.is_finite() && (0.0..=1.0).contains(&probability)) {
            return Err(ScoringError::InvalidProbability(probability));
        }
        Ok(Self {
            churn_probability: probability,
            churn_prediction:  threshold.decide(probability),
            threshold:         threshold.value(),
            model,
        })
    }
}
