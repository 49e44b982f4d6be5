// ============================================================
// Layer 5 — ResNet Backbone
// ============================================================
// Shared-weight feature extractor for both time steps.
//
// The network is the usual ResNet layout:
//   stem:   7x7/2 conv → BN → ReLU → 3x3/2 max-pool
//   layer1..layer4 of BasicBlock (18/34) or Bottleneck (50)
//
// It is truncated after `stages` stages (the stem counts as the
// first), so only `stages - 1` residual layers are built. ResNet34
// and ResNet50 trade the stride of layer3/layer4 for dilation to
// keep a denser map. Weights are randomly initialised.

use anyhow::Result;
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::geometry::{
    layer_dilations, layer_strides, residual_layers, BASE_PLANES,
};
use crate::domain::options::Backbone;

#[derive(Config, Debug)]
pub struct ResNetBackboneConfig {
    #[config(default = 3)]
    pub input_nc: usize,
    #[config(default = "Backbone::ResNet18")]
    pub backbone: Backbone,
    #[config(default = 4)]
    pub stages:   usize,
}

impl ResNetBackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResNetBackbone<B>> {
        let layer_count = residual_layers(self.stages)?;
        let expansion   = self.backbone.expansion();
        let counts      = self.backbone.block_counts();
        let strides     = layer_strides(self.backbone);
        let dilations   = layer_dilations(self.backbone);

        let conv1 = Conv2dConfig::new([self.input_nc, BASE_PLANES], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(BASE_PLANES).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut inplanes = BASE_PLANES;
        let mut layers = Vec::with_capacity(layer_count);
        for i in 0..layer_count {
            let planes = BASE_PLANES << i;
            let out    = planes * expansion;
            let (first_dilation, later_dilation) = dilations[i];

            let blocks = (0..counts[i])
                .map(|j| {
                    if j == 0 {
                        let downsample = (strides[i] != 1 || inplanes != out)
                            .then(|| Downsample::new(inplanes, out, strides[i], device));
                        ResidualBlock::new(
                            self.backbone, inplanes, planes, strides[i],
                            first_dilation, downsample, device,
                        )
                    } else {
                        ResidualBlock::new(
                            self.backbone, out, planes, 1, later_dilation, None, device,
                        )
                    }
                })
                .collect();

            layers.push(ResidualLayer { blocks });
            inplanes = out;
        }

        tracing::debug!(
            "Built {} backbone with {} residual layers, {} output channels",
            self.backbone, layer_count, inplanes
        );

        Ok(ResNetBackbone { conv1, bn1, maxpool, layers, out_channels: inplanes })
    }
}

fn conv3x3<B: Backend>(
    in_c: usize, out_c: usize, stride: usize, dilation: usize, device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_c, out_c], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(dilation, dilation))
        .with_dilation([dilation, dilation])
        .with_bias(false)
        .init(device)
}

fn conv1x1<B: Backend>(in_c: usize, out_c: usize, stride: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([in_c, out_c], [1, 1])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Valid)
        .with_bias(false)
        .init(device)
}

/// 1x1 projection on the identity path when shape changes.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_c: usize, out_c: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: conv1x1(in_c, out_c, stride, device),
            bn:   BatchNormConfig::new(out_c).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Two 3x3 convolutions with a residual connection.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub bn1:        BatchNorm<B>,
    pub conv2:      Conv2d<B>,
    pub bn2:        BatchNorm<B>,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };
        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + identity)
    }
}

/// 1x1 reduce → 3x3 (strided/dilated) → 1x1 expand, with a residual connection.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub bn1:        BatchNorm<B>,
    pub conv2:      Conv2d<B>,
    pub bn2:        BatchNorm<B>,
    pub conv3:      Conv2d<B>,
    pub bn3:        BatchNorm<B>,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };
        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = relu(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));
        relu(out + identity)
    }
}

#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    Basic(BasicBlock<B>),
    Bottleneck(Bottleneck<B>),
}

impl<B: Backend> ResidualBlock<B> {
    fn new(
        backbone:   Backbone,
        inplanes:   usize,
        planes:     usize,
        stride:     usize,
        dilation:   usize,
        downsample: Option<Downsample<B>>,
        device:     &B::Device,
    ) -> Self {
        if backbone.uses_bottleneck() {
            let out = planes * backbone.expansion();
            Self::Bottleneck(Bottleneck {
                conv1: conv1x1(inplanes, planes, 1, device),
                bn1:   BatchNormConfig::new(planes).init(device),
                conv2: conv3x3(planes, planes, stride, dilation, device),
                bn2:   BatchNormConfig::new(planes).init(device),
                conv3: conv1x1(planes, out, 1, device),
                bn3:   BatchNormConfig::new(out).init(device),
                downsample,
            })
        } else {
            // only the first conv is dilated, the second keeps a 3x3 receptive field
            Self::Basic(BasicBlock {
                conv1: conv3x3(inplanes, planes, stride, dilation, device),
                bn1:   BatchNormConfig::new(planes).init(device),
                conv2: conv3x3(planes, planes, 1, 1, device),
                bn2:   BatchNormConfig::new(planes).init(device),
                downsample,
            })
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Basic(block)      => block.forward(x),
            Self::Bottleneck(block) => block.forward(x),
        }
    }
}

#[derive(Module, Debug)]
pub struct ResidualLayer<B: Backend> {
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> ResidualLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct ResNetBackbone<B: Backend> {
    pub conv1:        Conv2d<B>,
    pub bn1:          BatchNorm<B>,
    pub maxpool:      MaxPool2d,
    pub layers:       Vec<ResidualLayer<B>>,
    pub out_channels: usize,
}

impl<B: Backend> ResNetBackbone<B> {
    /// images: [batch, input_nc, H, W] → [batch, out_channels, H/stride, W/stride]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.bn1.forward(self.conv1.forward(images)));
        let x = self.maxpool.forward(x);
        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    use crate::domain::geometry::{feature_extent, stage_channels};

    type TestBackend = NdArray;

    #[test]
    fn test_resnet18_layer_structure() {
        let device = Default::default();
        let backbone = ResNetBackboneConfig::new()
            .with_stages(5)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(backbone.layers.len(), 4);
        assert!(backbone.layers.iter().all(|l| l.blocks.len() == 2));
        // layer1 keeps 64 channels at stride 1, so no projection
        match &backbone.layers[0].blocks[0] {
            ResidualBlock::Basic(b) => assert!(b.downsample.is_none()),
            ResidualBlock::Bottleneck(_) => panic!("resnet18 uses basic blocks"),
        }
        match &backbone.layers[1].blocks[0] {
            ResidualBlock::Basic(b) => assert!(b.downsample.is_some()),
            ResidualBlock::Bottleneck(_) => panic!("resnet18 uses basic blocks"),
        }
        assert_eq!(backbone.out_channels, 512);
    }

    #[test]
    fn test_truncation_controls_output_shape() {
        let device = Default::default();
        for stages in [3, 4] {
            let backbone = ResNetBackboneConfig::new()
                .with_stages(stages)
                .init::<TestBackend>(&device)
                .unwrap();
            let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
            let [b, c, h, w] = backbone.forward(x).dims();
            let side = feature_extent(64, Backbone::ResNet18, stages, false).unwrap();
            assert_eq!([b, c, h, w], [
                1,
                stage_channels(Backbone::ResNet18, stages).unwrap(),
                side,
                side,
            ]);
        }
    }

    #[test]
    fn test_resnet50_is_dilated_and_expanded() {
        let device = Default::default();
        let backbone = ResNetBackboneConfig::new()
            .with_backbone(Backbone::ResNet50)
            .with_stages(4)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(backbone.out_channels, 1024);
        let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let out = backbone.forward(x);
        // stride 8: layer3 is dilated instead of strided
        assert_eq!(out.dims(), [1, 1024, 4, 4]);
    }

    #[test]
    fn test_resnet34_basic_blocks_run_dilated() {
        let device = Default::default();
        let backbone = ResNetBackboneConfig::new()
            .with_backbone(Backbone::ResNet34)
            .with_stages(5)
            .init::<TestBackend>(&device)
            .unwrap();
        let lengths: Vec<usize> = backbone.layers.iter().map(|l| l.blocks.len()).collect();
        assert_eq!(lengths, vec![3, 4, 6, 3]);
        assert_eq!(backbone.out_channels, 512);

        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        let out = backbone.forward(x);
        let side = feature_extent(64, Backbone::ResNet34, 5, false).unwrap();
        assert_eq!(side, 8);
        assert_eq!(out.dims(), [1, 512, side, side]);

        // resnet18 at the same depth keeps its strides
        let plain = ResNetBackboneConfig::new()
            .with_stages(5)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        assert_eq!(plain.forward(x).dims(), [1, 512, 2, 2]);
    }

    #[test]
    fn test_rejects_unsupported_depth() {
        let device = Default::default();
        let err = ResNetBackboneConfig::new()
            .with_stages(6)
            .init::<TestBackend>(&device);
        assert!(err.is_err());
    }
}
