// ============================================================
// Layer 5 — Logistic Regression (Burn)
// ============================================================
// A single Linear(F → 1) layer trained with Adam on a weighted,
// L2-penalised binary cross-entropy.
//
// Pipeline:
//   x  → x / scale            (scale-only standardisation)
//   z  = w · x + b            (logit)
//   p  = sigmoid(z)
//
// Loss per sample, in the numerically stable logit form:
//   max(z, 0) - z * y + ln(1 + e^-|z|)
// weighted by the balanced class weight of the sample, plus
//   (1 / 2C) * ||w||² / n_train
//
// After training the weights are copied out of the burn module
// into a plain JSON artifact; scoring needs no tensors.

use anyhow::{anyhow, bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    nn::{Initializer, Linear, LinearConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{ChurnBatch, ChurnBatcher};
use crate::data::dataset::{ChurnDataset, FeatureMatrix};
use crate::domain::error::{SchemaIssue, SchemaMismatch};
use crate::domain::prediction::ModelKind;
use crate::domain::traits::ChurnModel;
use crate::ml::boosting::sigmoid;

type TrainBackend = Autodiff<NdArray>;

// ─── Hyper-parameters ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub epochs:     usize,
    pub batch_size: usize,
    pub lr:         f64,
    /// Inverse regularisation strength.
    pub c:          f64,
    pub seed:       u64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self { epochs: 60, batch_size: 256, lr: 0.05, c: 1.0, seed: 42 }
    }
}

// ─── Burn module ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LogisticRegressionConfig {
    pub n_features: usize,
}

impl LogisticRegressionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LogisticRegression<B> {
        let linear = LinearConfig::new(self.n_features, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);
        LogisticRegression { linear }
    }
}

#[derive(Module, Debug)]
pub struct LogisticRegression<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> LogisticRegression<B> {
    /// features: [batch, F] → logits: [batch]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 1> {
        let logits = self.linear.forward(features);
        let [batch, _] = logits.dims();
        logits.reshape([batch])
    }

    /// Weighted mean BCE plus `l2 * ||w||²`.
    pub fn forward_loss(&self, batch: ChurnBatch<B>, l2: f64) -> Tensor<B, 1> {
        let z = self.forward(batch.features);
        let per_sample = z.clone().clamp_min(0.0) - z.clone() * batch.labels
            + z.abs().neg().exp().log1p();
        let data_loss = (per_sample * batch.weights).mean();
        let penalty = self.linear.weight.val().powf_scalar(2.0).sum().mul_scalar(l2);
        data_loss + penalty
    }
}

// ─── Artifact ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub schema_fingerprint: String,
    pub columns:            Vec<String>,
    /// Per-column divisor applied before the linear layer.
    pub scale:              Vec<f64>,
    pub weights:            Vec<f64>,
    pub bias:               f64,
}

impl LogisticArtifact {
    pub fn logit(&self, features: &[f64]) -> f64 {
        self.bias
            + features
                .iter()
                .zip(&self.scale)
                .zip(&self.weights)
                .map(|((x, s), w)| w * x / s)
                .sum::<f64>()
    }
}

impl ChurnModel for LogisticArtifact {
    fn kind(&self) -> ModelKind {
        ModelKind::Logreg
    }

    fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn check_shape(&self) -> Result<(), SchemaMismatch> {
        let n = self.columns.len();
        let mut details = Vec::new();
        if self.weights.len() != n {
            details.push(format!("{} weights for {n} columns", self.weights.len()));
        }
        if self.scale.len() != n {
            details.push(format!("{} scale factors for {n} columns", self.scale.len()));
        }
        if let Some(j) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            details.push(format!("scale[{j}] is zero or not finite"));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            details.push("coefficients must be finite".to_string());
        }
        let artifact = ModelKind::Logreg.artifact_file();
        SchemaMismatch::check(
            details
                .into_iter()
                .map(|detail| SchemaIssue::MalformedArtifact { artifact: artifact.to_string(), detail })
                .collect(),
        )
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.logit(features))
    }
}

/// Population standard deviation per column; zero becomes 1.
pub fn column_scale(matrix: &FeatureMatrix) -> Vec<f64> {
    let n = matrix.n_rows() as f64;
    (0..matrix.n_features())
        .map(|j| {
            if n == 0.0 {
                return 1.0;
            }
            let mean = matrix.rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let var  = matrix.rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
            let std  = var.sqrt();
            if std > 0.0 && std.is_finite() { std } else { 1.0 }
        })
        .collect()
}

// ─── Training ─────────────────────────────────────────────────────────────────
pub fn train_logistic(
    cfg:                &LogisticConfig,
    train:              &FeatureMatrix,
    schema_fingerprint: &str,
) -> Result<LogisticArtifact> {
    if train.n_rows() == 0 {
        bail!("cannot train logistic regression on an empty training set");
    }
    if cfg.epochs == 0 || cfg.batch_size == 0 {
        bail!("epochs and batch_size must be at least 1");
    }
    if !(cfg.c > 0.0) {
        bail!("C must be positive, got {}", cfg.c);
    }

    let device = NdArrayDevice::default();
    let scale  = column_scale(train);
    let l2     = 0.5 / (cfg.c * train.n_rows() as f64);

    let mut model: LogisticRegression<TrainBackend> =
        LogisticRegressionConfig::new(train.n_features()).init(&device);
    let mut optim = AdamConfig::new().init();

    let loader = DataLoaderBuilder::new(ChurnBatcher::<TrainBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(ChurnDataset::from_matrix(train, &scale));

    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in loader.iter() {
            let loss = model.forward_loss(batch, l2);
            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);
        }

        if epoch == 1 || epoch % 10 == 0 || epoch == cfg.epochs {
            tracing::debug!("logreg epoch {}/{}: loss={:.5}", epoch, cfg.epochs, loss_sum / batches.max(1) as f64);
        }
    }

    let model = model.valid();
    let weights = model
        .linear
        .weight
        .val()
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read logistic weights: {e:?}"))?;
    let bias = match &model.linear.bias {
        Some(b) => b
            .val()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read logistic bias: {e:?}"))?
            .first()
            .copied()
            .unwrap_or(0.0),
        None => 0.0,
    };

    tracing::info!("Trained logistic regression on {} rows x {} features", train.n_rows(), train.n_features());

    Ok(LogisticArtifact {
        schema_fingerprint: schema_fingerprint.to_string(),
        columns:            train.columns.clone(),
        scale,
        weights:            weights.into_iter().map(f64::from).collect(),
        bias:               f64::from(bias),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> FeatureMatrix {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, 100.0]).collect();
        let labels = rows.iter().map(|r| if r[0] >= 30.0 { 1.0 } else { 0.0 }).collect();
        FeatureMatrix { columns: vec!["x".into(), "constant".into()], rows, labels }
    }

    #[test]
    fn test_column_scale_is_population_std() {
        let m = FeatureMatrix {
            columns: vec!["a".into(), "b".into()],
            rows:    vec![vec![1.0, 5.0], vec![3.0, 5.0]],
            labels:  vec![0.0, 1.0],
        };
        assert_eq!(column_scale(&m), vec![1.0, 1.0]);

        let m = FeatureMatrix { rows: vec![vec![0.0, 5.0], vec![4.0, 5.0]], ..m };
        assert_eq!(column_scale(&m), vec![2.0, 1.0]);
    }

    #[test]
    fn test_artifact_scoring() {
        let art = LogisticArtifact {
            schema_fingerprint: "fp".into(),
            columns:            vec!["a".into(), "b".into()],
            scale:              vec![2.0, 1.0],
            weights:            vec![1.0, -1.0],
            bias:               0.5,
        };
        // 0.5 + 4/2 - 3 = -0.5
        assert!((art.logit(&[4.0, 3.0]) + 0.5).abs() < 1e-12);
        assert!((art.predict_proba(&[1.0, 1.5]) - 0.5).abs() < 1e-12);
        assert_eq!(art.kind(), ModelKind::Logreg);
    }

    #[test]
    fn test_short_coefficients_fail_shape_check() {
        let art = LogisticArtifact {
            schema_fingerprint: "fp".into(),
            columns:            vec!["a".into(), "b".into()],
            scale:              vec![2.0, 1.0],
            weights:            vec![1.0, -1.0],
            bias:               0.5,
        };
        assert!(art.check_shape().is_ok());

        let short = LogisticArtifact { weights: vec![1.0], scale: vec![2.0], ..art.clone() };
        let err = short.check_shape().unwrap_err();
        assert_eq!(err.issues.len(), 2);

        let zero_scale = LogisticArtifact { scale: vec![0.0, 1.0], ..art };
        assert!(zero_scale.check_shape().unwrap_err().to_string().contains("scale[0]"));
    }

    #[test]
    fn test_training_separates_classes() {
        let cfg = LogisticConfig { epochs: 40, batch_size: 16, lr: 0.1, ..LogisticConfig::default() };
        let art = train_logistic(&cfg, &separable(), "fp").unwrap();
        assert_eq!(art.weights.len(), 2);
        assert!(art.weights[0] > 0.0);
        assert!(art.predict_proba(&[55.0, 100.0]) > art.predict_proba(&[5.0, 100.0]));
        assert!(art.predict_proba(&[55.0, 100.0]) > 0.5);
        assert!(art.predict_proba(&[5.0, 100.0]) < 0.5);
    }

    #[test]
    fn test_forward_shapes() {
        let device = NdArrayDevice::default();
        let model: LogisticRegression<NdArray> = LogisticRegressionConfig::new(3).init(&device);
        let x = Tensor::<NdArray, 2>::zeros([4, 3], &device);
        assert_eq!(model.forward(x).dims(), [4]);
    }

    #[test]
    fn test_rejects_empty_or_bad_config() {
        let empty = FeatureMatrix { columns: vec!["x".into()], rows: vec![], labels: vec![] };
        assert!(train_logistic(&LogisticConfig::default(), &empty, "fp").is_err());
        let cfg = LogisticConfig { c: 0.0, ..LogisticConfig::default() };
        assert!(train_logistic(&cfg, &separable(), "fp").is_err());
    }
}
