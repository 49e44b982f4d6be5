// ============================================================
// Layer 4 — Pair Batcher
// ============================================================
// Stacks a Vec<ImagePair> into two tensors the detector can
// consume in one forward pass.
//
//   Input:  N pairs, each C×H×W per time step
//   Output: PairBatch { pre: [N, C, H, W], post: [N, C, H, W] }
//
// Every pair's CHW buffer is appended in order, so a flat Vec
// reshaped to [N, C, H, W] lands each sample on its own row.
// Mixed shapes cannot be stacked and are rejected up front.

use anyhow::{ensure, Result};
use burn::prelude::*;

use crate::domain::pair::ImagePair;

// ─── PairBatch ────────────────────────────────────────────────────────────────
/// A batch of image pairs ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// Earlier images — shape: [batch_size, channels, height, width]
    pub pre:  Tensor<B, 4>,
    /// Later images — same shape as `pre`
    pub post: Tensor<B, 4>,
}

impl<B: Backend> PairBatch<B> {
    pub fn len(&self) -> usize {
        self.pre.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── PairBatcher ──────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the model lives.
#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Convert pairs into a single `PairBatch`.
    pub fn batch(&self, items: Vec<ImagePair>) -> Result<PairBatch<B>> {
        ensure!(!items.is_empty(), "cannot batch an empty list of image pairs");
        let first = &items[0];
        let [c, h, w] = first.shape();
        if let Some((i, odd)) = items.iter().enumerate().find(|(_, p)| !p.same_shape(first)) {
            anyhow::bail!(
                "pair {i} has shape {:?}, batch started with {:?}",
                odd.shape(),
                first.shape()
            );
        }

        let n = items.len();
        let mut pre  = Vec::with_capacity(n * c * h * w);
        let mut post = Vec::with_capacity(n * c * h * w);
        for pair in items {
            pre.extend(pair.pre);
            post.extend(pair.post);
        }

        tracing::debug!("Batched {n} pairs of {c}x{h}x{w}");
        Ok(PairBatch {
            pre:  Tensor::from_data(TensorData::new(pre, [n, c, h, w]), &self.device),
            post: Tensor::from_data(TensorData::new(post, [n, c, h, w]), &self.device),
        })
    }
}
