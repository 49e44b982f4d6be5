// ============================================================
// Layer 5 — Feature Extractor
// ============================================================
// The shared-weight half of the siamese pair: a truncated ResNet,
// an optional nearest ×2 upsample, then a 3x3 projection to a
// fixed feature width.

use anyhow::{ensure, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};

use crate::domain::geometry::{check_stages, feature_extent, stage_channels, FEATURE_DIM};
use crate::domain::options::Backbone;
use crate::ml::backbone::{ResNetBackbone, ResNetBackboneConfig};
use crate::ml::resample::upsample_nearest;

/// Backbone plus the 3x3 projection that brings every variant to the
/// same feature width. Applied with shared weights to both images.
#[derive(Config, Debug)]
pub struct FeatureExtractorConfig {
    #[config(default = 3)]
    pub input_nc:    usize,
    /// Expected input side, used to size position tables.
    #[config(default = 256)]
    pub image_size:  usize,
    #[config(default = "Backbone::ResNet18")]
    pub backbone:    Backbone,
    #[config(default = 4)]
    pub stages:      usize,
    #[config(default = true)]
    pub upsample_2x: bool,
    #[config(default = 32)]
    pub feature_dim: usize,
}

impl FeatureExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        check_stages(self.stages)?;
        ensure!(self.input_nc > 0, "input_nc must be positive");
        ensure!(self.feature_dim > 0, "feature_dim must be positive");
        ensure!(self.image_size > 0, "image_size must be positive");
        Ok(())
    }

    /// Side of the extracted feature map for a square input of `image_size`.
    pub fn feature_side(&self) -> Result<usize> {
        self.feature_side_for(self.image_size)
    }

    pub fn feature_side_for(&self, side: usize) -> Result<usize> {
        feature_extent(side, self.backbone, self.stages, self.upsample_2x)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FeatureExtractor<B>> {
        self.validate()?;
        let backbone = ResNetBackboneConfig::new()
            .with_input_nc(self.input_nc)
            .with_backbone(self.backbone)
            .with_stages(self.stages)
            .init(device)?;
        let conv_pred = Conv2dConfig::new(
            [stage_channels(self.backbone, self.stages)?, self.feature_dim],
            [3, 3],
        )
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device);

        Ok(FeatureExtractor { backbone, conv_pred, upsample_2x: self.upsample_2x })
    }
}

#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub backbone:    ResNetBackbone<B>,
    pub conv_pred:   Conv2d<B>,
    pub upsample_2x: bool,
}

impl<B: Backend> FeatureExtractor<B> {
    /// images: [batch, input_nc, H, W] → [batch, feature_dim, h, w]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.backbone.forward(images);
        let x = if self.upsample_2x { upsample_nearest(x, 2) } else { x };
        self.conv_pred.forward(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_projects_to_feature_dim() {
        let device = Default::default();
        let cfg = FeatureExtractorConfig::new().with_image_size(64);
        let extractor = cfg.init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 64, 64], Distribution::Default, &device);
        let side = cfg.feature_side().unwrap();
        assert_eq!(side, 8);
        assert_eq!(extractor.forward(x).dims(), [2, FEATURE_DIM, side, side]);
    }

    #[test]
    fn test_without_upsampling_map_is_half_size() {
        let device = Default::default();
        let cfg = FeatureExtractorConfig::new()
            .with_image_size(64)
            .with_stages(3)
            .with_upsample_2x(false);
        let extractor = cfg.init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        assert_eq!(extractor.forward(x).dims(), [1, 32, 8, 8]);
    }

    #[test]
    fn test_custom_input_channels() {
        let device = Default::default();
        let cfg = FeatureExtractorConfig::new().with_input_nc(4).with_image_size(32);
        let extractor = cfg.init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 4>::zeros([1, 4, 32, 32], &device);
        assert_eq!(extractor.forward(x).dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn test_validate_rejects_zero_channels() {
        assert!(FeatureExtractorConfig::new().with_input_nc(0).validate().is_err());
        assert!(FeatureExtractorConfig::new().with_stages(2).validate().is_err());
    }
}
