// ============================================================
// Layer 5 — Gradient-Boosted Trees
// ============================================================
// Second-order boosting of regression trees on the logistic
// loss, deterministic for a fixed seed.
//
// Per round:
//   p = sigmoid(margin)
//   g = p - y            (gradient)
//   h = p * (1 - p)      (hessian)
//   grow one tree on a row / column sample
//   margin += learning_rate * tree(x)
//
// Split search is exact and greedy:
//   gain = GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)
//   leaf = -G / (H + λ)
// Rows with x < threshold go left.
//
// Artifact layout (churn_gbt.json):
//   { schema_fingerprint, columns, base_margin, learning_rate,
//     trees: [ { nodes: [ {split|leaf}, ... ] }, ... ] }
// Node 0 is the root of every tree; children always come after
// their parent, which is checked before a tree is served.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::FeatureMatrix;
use crate::domain::error::{SchemaIssue, SchemaMismatch};
use crate::domain::prediction::ModelKind;
use crate::domain::traits::ChurnModel;

/// A split must improve the objective by more than this.
const MIN_GAIN: f64 = 1e-12;

// ─── Hyper-parameters ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbtConfig {
    pub n_estimators:     usize,
    pub max_depth:        usize,
    pub learning_rate:    f64,
    pub subsample:        f64,
    pub colsample_bytree: f64,
    pub lambda:           f64,
    pub min_child_weight: f64,
    pub seed:             u64,
}

impl Default for GbtConfig {
    fn default() -> Self {
        Self {
            n_estimators:     300,
            max_depth:        4,
            learning_rate:    0.05,
            subsample:        0.9,
            colsample_bytree: 0.9,
            lambda:           1.0,
            min_child_weight: 1.0,
            seed:             42,
        }
    }
}

impl GbtConfig {
    fn check(&self) -> Result<()> {
        if self.n_estimators == 0 {
            bail!("n_estimators must be at least 1");
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        for (name, v) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(v > 0.0 && v <= 1.0) {
                bail!("{name} must be in (0, 1], got {v}");
            }
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 {
            bail!("lambda and min_child_weight must be non-negative");
        }
        Ok(())
    }
}

// ─── Artifact ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Raw leaf value for one row. Malformed links end in 0.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        // a well-formed tree never revisits a node
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split { feature, threshold, left, right }) => {
                    let x = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if x < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
        0.0
    }

    /// First structural defect of the tree, if any.
    pub fn defect(&self, n_features: usize) -> Option<String> {
        if self.nodes.is_empty() {
            return Some("empty tree".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Some(format!("node {idx}: leaf value is not finite"));
                }
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= n_features {
                        return Some(format!("node {idx}: feature {feature} out of {n_features} columns"));
                    }
                    if threshold.is_nan() {
                        return Some(format!("node {idx}: threshold is NaN"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Some(format!("node {idx}: child link {child} is invalid"));
                        }
                    }
                }
                Node::Leaf { .. } => {}
            }
        }
        None
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, budget: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) if budget > 0 => {
                    1 + walk(nodes, *left, budget - 1).max(walk(nodes, *right, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedArtifact {
    pub schema_fingerprint: String,
    pub columns:            Vec<String>,
    pub base_margin:        f64,
    pub learning_rate:      f64,
    pub trees:              Vec<Tree>,
}

impl BoostedArtifact {
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.base_margin + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }
}

impl ChurnModel for BoostedArtifact {
    fn kind(&self) -> ModelKind {
        ModelKind::Gbt
    }

    fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn check_shape(&self) -> Result<(), SchemaMismatch> {
        let mut details = Vec::new();
        if !self.base_margin.is_finite() || !self.learning_rate.is_finite() {
            details.push("base_margin and learning_rate must be finite".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if let Some(defect) = tree.defect(self.columns.len()) {
                details.push(format!("tree {t}, {defect}"));
            }
        }
        let artifact = ModelKind::Gbt.artifact_file();
        SchemaMismatch::check(
            details
                .into_iter()
                .map(|detail| SchemaIssue::MalformedArtifact { artifact: artifact.to_string(), detail })
                .collect(),
        )
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

// ─── Training ─────────────────────────────────────────────────────────────────
pub fn train_boosted(
    cfg:                &GbtConfig,
    train:              &FeatureMatrix,
    schema_fingerprint: &str,
) -> Result<BoostedArtifact> {
    cfg.check()?;
    if train.n_rows() == 0 {
        bail!("cannot train boosted trees on an empty training set");
    }

    let n          = train.n_rows();
    let n_features = train.n_features();
    let prior      = (train.positives() as f64 / n as f64).clamp(1e-6, 1.0 - 1e-6);
    let base       = (prior / (1.0 - prior)).ln();

    let mut rng    = StdRng::seed_from_u64(cfg.seed);
    let mut margin = vec![base; n];
    let mut trees  = Vec::with_capacity(cfg.n_estimators);

    let n_rows_sampled = ((n as f64) * cfg.subsample).ceil().max(1.0) as usize;
    let n_cols_sampled = ((n_features as f64) * cfg.colsample_bytree).ceil().max(1.0) as usize;

    let all_rows: Vec<usize> = (0..n).collect();
    let all_cols: Vec<usize> = (0..n_features).collect();

    for round in 0..cfg.n_estimators {
        let mut grad = Vec::with_capacity(n);
        let mut hess = Vec::with_capacity(n);
        for (m, y) in margin.iter().zip(&train.labels) {
            let p = sigmoid(*m);
            grad.push(p - y);
            hess.push((p * (1.0 - p)).max(1e-16));
        }

        let mut rows: Vec<usize> = all_rows
            .choose_multiple(&mut rng, n_rows_sampled.min(n))
            .copied()
            .collect();
        rows.sort_unstable();
        let mut cols: Vec<usize> = all_cols
            .choose_multiple(&mut rng, n_cols_sampled.min(n_features))
            .copied()
            .collect();
        cols.sort_unstable();

        let grower = TreeGrower { cfg, train, grad: &grad, hess: &hess, cols: &cols };
        let tree = grower.grow(rows);

        for (i, row) in train.rows.iter().enumerate() {
            margin[i] += cfg.learning_rate * tree.predict(row);
        }
        trees.push(tree);

        if (round + 1) % 50 == 0 {
            let loss = mean_logloss(&margin, &train.labels);
            tracing::debug!("boosting round {}/{}: train logloss={:.5}", round + 1, cfg.n_estimators, loss);
        }
    }

    tracing::info!("Trained {} trees on {} rows x {} features", trees.len(), n, n_features);

    Ok(BoostedArtifact {
        schema_fingerprint: schema_fingerprint.to_string(),
        columns:            train.columns.clone(),
        base_margin:        base,
        learning_rate:      cfg.learning_rate,
        trees,
    })
}

fn mean_logloss(margin: &[f64], labels: &[f64]) -> f64 {
    let n = margin.len().max(1) as f64;
    margin
        .iter()
        .zip(labels)
        .map(|(z, y)| z.max(0.0) - z * y + (1.0 + (-z.abs()).exp()).ln())
        .sum::<f64>()
        / n
}

struct TreeGrower<'a> {
    cfg:   &'a GbtConfig,
    train: &'a FeatureMatrix,
    grad:  &'a [f64],
    hess:  &'a [f64],
    cols:  &'a [usize],
}

struct BestSplit {
    gain:      f64,
    feature:   usize,
    threshold: f64,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: Vec<usize>) -> Tree {
        let mut nodes = Vec::new();
        self.build(rows, 0, &mut nodes);
        Tree { nodes }
    }

    /// Append the subtree for `rows`, returning its root index.
    fn build(&self, rows: Vec<usize>, depth: usize, nodes: &mut Vec<Node>) -> usize {
        let idx = nodes.len();
        let g: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hess[i]).sum();
        nodes.push(Node::Leaf { value: -g / (h + self.cfg.lambda) });

        if depth >= self.cfg.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(best) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.train.rows[i][best.feature] < best.threshold);

        let left  = self.build(left_rows, depth + 1, nodes);
        let right = self.build(right_rows, depth + 1, nodes);
        nodes[idx] = Node::Split { feature: best.feature, threshold: best.threshold, left, right };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<BestSplit> {
        let lambda = self.cfg.lambda;
        let parent = g * g / (h + lambda);
        let mut best: Option<BestSplit> = None;

        let mut order = rows.to_vec();
        for &f in self.cols {
            let x = |i: usize| self.train.rows[i][f];
            order.sort_by(|&a, &b| x(a).total_cmp(&x(b)));

            let (mut gl, mut hl) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                gl += self.grad[i];
                hl += self.hess[i];

                let (here, next) = (x(i), x(order[k + 1]));
                if here == next {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.cfg.min_child_weight || hr < self.cfg.min_child_weight {
                    continue;
                }
                let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent;
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { gain, feature: f, threshold: (here + next) / 2.0 });
                }
            }
        }
        best
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// y = 1 iff x0 > 5; x1 is noise.
    fn step_matrix() -> FeatureMatrix {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 10) as f64, ((i * 7) % 3) as f64]).collect();
        let labels = rows.iter().map(|r| if r[0] > 5.0 { 1.0 } else { 0.0 }).collect();
        FeatureMatrix { columns: vec!["x0".into(), "x1".into()], rows, labels }
    }

    fn small_cfg() -> GbtConfig {
        GbtConfig { n_estimators: 30, learning_rate: 0.3, min_child_weight: 0.1, ..GbtConfig::default() }
    }

    #[test]
    fn test_learns_a_step_function() {
        let art = train_boosted(&small_cfg(), &step_matrix(), "fp").unwrap();
        assert!(art.predict_proba(&[9.0, 0.0]) > 0.8);
        assert!(art.predict_proba(&[1.0, 0.0]) < 0.2);
        assert_eq!(art.kind(), ModelKind::Gbt);
        assert_eq!(art.schema_fingerprint(), "fp");
    }

    #[test]
    fn test_training_is_deterministic_for_a_seed() {
        let a = train_boosted(&small_cfg(), &step_matrix(), "fp").unwrap();
        let b = train_boosted(&small_cfg(), &step_matrix(), "fp").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trees_respect_max_depth() {
        let cfg = GbtConfig { max_depth: 2, ..small_cfg() };
        let art = train_boosted(&cfg, &step_matrix(), "fp").unwrap();
        assert!(art.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_single_class_gives_constant_prior() {
        let mut m = step_matrix();
        m.labels = vec![0.0; m.rows.len()];
        let art = train_boosted(&small_cfg(), &m, "fp").unwrap();
        let p = art.predict_proba(&[9.0, 0.0]);
        assert!(p < 0.01);
    }

    #[test]
    fn test_invalid_config_and_empty_data_are_rejected() {
        let cfg = GbtConfig { subsample: 0.0, ..GbtConfig::default() };
        assert!(train_boosted(&cfg, &step_matrix(), "fp").is_err());

        let empty = FeatureMatrix { columns: vec!["x".into()], rows: vec![], labels: vec![] };
        assert!(train_boosted(&GbtConfig::default(), &empty, "fp").is_err());
    }

    #[test]
    fn test_hand_built_tree_and_json_layout() {
        let tree = Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold: 2.5, left: 1, right: 2 },
                Node::Leaf { value: -1.0 },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert_eq!(tree.predict(&[1.0]), -1.0);
        assert_eq!(tree.predict(&[2.5]), 1.0);
        assert_eq!(tree.depth(), 1);

        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains(r#""kind":"split""#));
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_trained_trees_pass_shape_check() {
        let art = train_boosted(&small_cfg(), &step_matrix(), "fp").unwrap();
        assert!(art.check_shape().is_ok());
    }

    #[test]
    fn test_bad_tree_links_fail_shape_check() {
        let mut art = train_boosted(&small_cfg(), &step_matrix(), "fp").unwrap();
        art.trees.push(Tree {
            nodes: vec![
                Node::Split { feature: 5, threshold: 1.0, left: 1, right: 2 },
                Node::Leaf { value: 0.0 },
                Node::Leaf { value: 0.0 },
            ],
        });
        let err = art.check_shape().unwrap_err();
        assert!(err.to_string().contains("feature 5 out of 2 columns"));

        let cyclic = Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold: 1.0, left: 0, right: 1 },
                Node::Leaf { value: 0.0 },
            ],
        };
        assert!(cyclic.defect(1).is_some());
        assert!(Tree { nodes: vec![] }.defect(1).is_some());
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0).is_finite());
    }
}
