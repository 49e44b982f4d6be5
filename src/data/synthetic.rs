// ============================================================
// Layer 4 — Synthetic Pair Source
// ============================================================
// Generates image pairs with a known change so the models can be
// exercised without any dataset on disk.
//
//   pre   uniform noise in [0, 1)
//   post  a copy of pre with one rectangle redrawn
//
// The rectangle covers roughly `change_fraction` of the image and
// its position is random. A seed makes every run reproducible.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::pair::ImagePair;
use crate::domain::report::ChangeMask;
use crate::domain::traits::PairSource;

pub struct SyntheticPairSource {
    rng:             StdRng,
    channels:        usize,
    height:          usize,
    width:           usize,
    change_fraction: f64,
}

impl SyntheticPairSource {
    pub fn new(
        seed:            u64,
        channels:        usize,
        height:          usize,
        width:           usize,
        change_fraction: f64,
    ) -> Result<Self> {
        ensure!(
            channels > 0 && height > 0 && width > 0,
            "synthetic images need a non-empty shape"
        );
        ensure!(
            (0.0..=1.0).contains(&change_fraction),
            "change fraction must be within [0, 1], got {change_fraction}"
        );
        Ok(Self { rng: StdRng::seed_from_u64(seed), channels, height, width, change_fraction })
    }

    fn noise(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.rng.gen::<f32>()).collect()
    }

    /// One pair together with the mask of pixels that were redrawn.
    pub fn labelled_pair(&mut self) -> Result<(ImagePair, ChangeMask)> {
        let (c, h, w) = (self.channels, self.height, self.width);
        let pre = self.noise(c * h * w);
        let mut post = pre.clone();

        let side = self.change_fraction.sqrt();
        let rect_h = ((h as f64 * side).round() as usize).min(h);
        let rect_w = ((w as f64 * side).round() as usize).min(w);
        let top  = self.rng.gen_range(0..=h - rect_h);
        let left = self.rng.gen_range(0..=w - rect_w);

        let mut pixels = vec![false; h * w];
        for y in top..top + rect_h {
            for x in left..left + rect_w {
                pixels[y * w + x] = true;
                for ch in 0..c {
                    post[ch * h * w + y * w + x] = self.rng.gen::<f32>();
                }
            }
        }

        let pair = ImagePair::new(c, h, w, pre, post)?;
        Ok((pair, ChangeMask { height: h, width: w, pixels }))
    }
}

impl PairSource for SyntheticPairSource {
    fn next_pairs(&mut self, count: usize) -> Result<Vec<ImagePair>> {
        let pairs = (0..count)
            .map(|_| self.labelled_pair().map(|(pair, _)| pair))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            "Generated {count} synthetic pairs of {}x{}x{}",
            self.channels,
            self.height,
            self.width
        );
        Ok(pairs)
    }
}
