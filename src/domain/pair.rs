// ============================================================
// Layer 3 — ImagePair Domain Type
// ============================================================
// Two co-registered images of the same scene taken at different
// times. Pixels are stored channel-major (CHW) as f32, which is
// the layout the batcher hands to the tensor backend.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// A bi-temporal image pair with identical shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePair {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
    /// Image at the earlier time step, CHW
    pub pre:  Vec<f32>,
    /// Image at the later time step, CHW
    pub post: Vec<f32>,
}

impl ImagePair {
    /// Build a pair, checking that both buffers match the declared shape.
    pub fn new(
        channels: usize,
        height:   usize,
        width:    usize,
        pre:      Vec<f32>,
        post:     Vec<f32>,
    ) -> Result<Self> {
        ensure!(
            channels > 0 && height > 0 && width > 0,
            "image shape must be non-empty, got {channels}x{height}x{width}"
        );
        let expected = channels * height * width;
        ensure!(
            pre.len() == expected,
            "pre image has {} values, expected {expected} for {channels}x{height}x{width}",
            pre.len()
        );
        ensure!(
            post.len() == expected,
            "post image has {} values, expected {expected} for {channels}x{height}x{width}",
            post.len()
        );
        Ok(Self { channels, height, width, pre, post })
    }

    /// Shape as `[channels, height, width]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn same_shape(&self, other: &ImagePair) -> bool {
        self.shape() == other.shape()
    }

    /// Number of values in one image of the pair.
    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_buffers() {
        let ok = ImagePair::new(1, 2, 2, vec![0.0; 4], vec![1.0; 4]);
        assert!(ok.is_ok());

        let short_post = ImagePair::new(1, 2, 2, vec![0.0; 4], vec![1.0; 3]);
        assert!(short_post.is_err());

        let empty = ImagePair::new(0, 2, 2, vec![], vec![]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_same_shape() {
        let a = ImagePair::new(3, 2, 2, vec![0.0; 12], vec![0.0; 12]).unwrap();
        let b = ImagePair::new(3, 2, 2, vec![1.0; 12], vec![1.0; 12]).unwrap();
        let c = ImagePair::new(1, 3, 4, vec![0.0; 12], vec![0.0; 12]).unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
        assert_eq!(a.numel(), 12);
    }
}
