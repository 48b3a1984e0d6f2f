// ============================================================
// Layer 4 — Churn Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ChurnSample>
// into tensors for the logistic-regression training loop.
//
//   Input:  N ChurnSamples, each with F features
//   Output: ChurnBatch { features [N, F], labels [N], weights [N] }
//
// Features are flattened row by row and reshaped:
//   [s1_f1, ..., s1_fF, s2_f1, ..., sN_fF] → [N, F]

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ChurnSample;

// ─── ChurnBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ChurnBatch<B: Backend> {
    /// shape: [batch_size, n_features]
    pub features: Tensor<B, 2>,

    /// 0.0 / 1.0, shape: [batch_size]
    pub labels: Tensor<B, 1>,

    /// Per-sample class weight, shape: [batch_size]
    pub weights: Tensor<B, 1>,
}

// ─── ChurnBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ChurnBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ChurnBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ChurnSample, ChurnBatch<B>> for ChurnBatcher<B> {
    fn batch(&self, items: Vec<ChurnSample>) -> ChurnBatch<B> {
        let batch_size = items.len();
        let n_features = items.first().map(|s| s.features.len()).unwrap_or(0);

        let flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();
        let labels:  Vec<f32> = items.iter().map(|s| s.label).collect();
        let weights: Vec<f32> = items.iter().map(|s| s.weight).collect();

        let features = Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([batch_size, n_features]);
        let labels  = Tensor::<B, 1>::from_floats(labels.as_slice(), &self.device);
        let weights = Tensor::<B, 1>::from_floats(weights.as_slice(), &self.device);

        ChurnBatch { features, labels, weights }
    }
}
