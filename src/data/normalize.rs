// ============================================================
// Layer 4 — Normaliser
// ============================================================
// Per-channel standardisation applied to both images of a pair:
//
//   x' = (x − mean[c]) / std[c]
//
// The defaults (mean = std = 0.5 on every channel) map pixel
// values in [0, 1] onto [−1, 1].

use anyhow::{ensure, Result};

use crate::domain::pair::ImagePair;

pub const DEFAULT_MEAN: f32 = 0.5;
pub const DEFAULT_STD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    mean: Vec<f32>,
    std:  Vec<f32>,
}

impl Normalizer {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        ensure!(!mean.is_empty(), "normaliser needs at least one channel");
        ensure!(
            mean.len() == std.len(),
            "mean has {} channels but std has {}",
            mean.len(),
            std.len()
        );
        ensure!(std.iter().all(|&s| s > 0.0), "std must be positive on every channel");
        Ok(Self { mean, std })
    }

    /// Same statistics on every channel.
    pub fn uniform(channels: usize, mean: f32, std: f32) -> Result<Self> {
        Self::new(vec![mean; channels], vec![std; channels])
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    fn apply_image(&self, image: &mut [f32], plane: usize) {
        for (c, values) in image.chunks_mut(plane).enumerate() {
            let (m, s) = (self.mean[c], self.std[c]);
            values.iter_mut().for_each(|v| *v = (*v - m) / s);
        }
    }

    /// Normalise both images of the pair in place.
    pub fn apply(&self, mut pair: ImagePair) -> Result<ImagePair> {
        ensure!(
            pair.channels == self.channels(),
            "normaliser is set up for {} channels, pair has {}",
            self.channels(),
            pair.channels
        );
        let plane = pair.height * pair.width;
        self.apply_image(&mut pair.pre, plane);
        self.apply_image(&mut pair.post, plane);
        Ok(pair)
    }

    pub fn apply_all(&self, pairs: Vec<ImagePair>) -> Result<Vec<ImagePair>> {
        pairs.into_iter().map(|p| self.apply(p)).collect()
    }
}
