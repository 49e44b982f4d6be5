// ============================================================
// Layer 5 — Change Head
// ============================================================
// Turns two refined feature maps into a per-pixel change map:
//
//   |a − b| → [nearest ×2] → bilinear to H×W → conv-bn-relu-conv → [sigmoid]
//
// The nearest ×2 step is only needed when the extractor did not
// upsample already; the bilinear step then lands on the exact input
// size whatever the backbone's rounding did.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::ml::resample::{resize_bilinear, upsample_nearest};

#[derive(Module, Debug)]
pub struct TwoLayerConv2d<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn:    BatchNorm<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> TwoLayerConv2d<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv1: Conv2dConfig::new([in_channels, in_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            bn:    BatchNormConfig::new(in_channels).init(device),
            conv2: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.bn.forward(self.conv1.forward(x)));
        self.conv2.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ChangeHeadConfig {
    #[config(default = 32)]
    pub in_channels:    usize,
    #[config(default = 1)]
    pub output_nc:      usize,
    #[config(default = false)]
    pub output_sigmoid: bool,
    /// Apply a nearest ×2 before the final resize.
    #[config(default = false)]
    pub nearest_2x:     bool,
}

impl ChangeHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ChangeHead<B> {
        ChangeHead {
            classifier:     TwoLayerConv2d::new(self.in_channels, self.output_nc, device),
            output_sigmoid: self.output_sigmoid,
            nearest_2x:     self.nearest_2x,
        }
    }
}

#[derive(Module, Debug)]
pub struct ChangeHead<B: Backend> {
    pub classifier:     TwoLayerConv2d<B>,
    pub output_sigmoid: bool,
    pub nearest_2x:     bool,
}

impl<B: Backend> ChangeHead<B> {
    /// a, b: [batch, c, h, w] → [batch, output_nc, size[0], size[1]]
    pub fn forward(&self, a: Tensor<B, 4>, b: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
        let x = (a - b).abs();
        let x = if self.nearest_2x { upsample_nearest(x, 2) } else { x };
        let x = self.classifier.forward(resize_bilinear(x, size));
        if self.output_sigmoid { sigmoid(x) } else { x }
    }
}
