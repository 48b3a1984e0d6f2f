// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Binary classification metrics over predicted probabilities:
//   log loss, ROC AUC, and accuracy / precision / recall at a
//   decision threshold (churn = p >= threshold).

use serde::{Deserialize, Serialize};

use crate::data::dataset::FeatureMatrix;
use crate::domain::prediction::Threshold;
use crate::domain::traits::ChurnModel;

/// Probabilities are clipped to [EPS, 1 - EPS] inside log loss.
const EPS: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub rows:      usize,
    pub logloss:   f64,
    /// NaN when only one class is present.
    pub auc:       f64,
    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
}

pub fn evaluate(model: &dyn ChurnModel, data: &FeatureMatrix, threshold: Threshold) -> EvalReport {
    let probs: Vec<f64> = data.rows.iter().map(|r| model.predict_proba(r)).collect();
    report(&probs, &data.labels, threshold)
}

pub fn report(probs: &[f64], labels: &[f64], threshold: Threshold) -> EvalReport {
    let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
    for (&p, &y) in probs.iter().zip(labels) {
        match (threshold.decide(p), y > 0.5) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }
    let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

    EvalReport {
        rows:      probs.len(),
        logloss:   log_loss(probs, labels),
        auc:       roc_auc(probs, labels),
        accuracy:  ratio(tp + tn, probs.len()),
        precision: ratio(tp, tp + fp),
        recall:    ratio(tp, tp + fn_),
    }
}

pub fn log_loss(probs: &[f64], labels: &[f64]) -> f64 {
    if probs.is_empty() {
        return f64::NAN;
    }
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / probs.len() as f64
}

/// Rank-based (Mann-Whitney) AUC; ties share their average rank.
pub fn roc_auc(probs: &[f64], labels: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if labels[k] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}
