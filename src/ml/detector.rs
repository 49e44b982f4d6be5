// ============================================================
// Layer 5 — Detector Seam
// ============================================================
// The application layer drives models through `ChangeDetector`
// and builds them from a `DetectorConfig`, which is what gets
// written to and read from disk.

use anyhow::Result;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::options::Architecture;
use crate::domain::report::ModelSummary;
use crate::ml::model::{BitModel, BitModelConfig, SiameseResNet, SiameseResNetConfig};

/// Anything that maps a bi-temporal pair to a change map.
pub trait ChangeDetector<B: Backend> {
    fn architecture(&self) -> Architecture;

    /// pre, post: [batch, channels, H, W] → [batch, classes, H, W]
    fn detect(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>>;

    fn input_channels(&self) -> usize;

    fn output_channels(&self) -> usize;

    /// True when `detect` already returns values in [0, 1].
    fn emits_probabilities(&self) -> bool;

    fn summary(&self) -> ModelSummary;
}

impl<B: Backend> ChangeDetector<B> for SiameseResNet<B> {
    fn architecture(&self) -> Architecture {
        Architecture::Baseline
    }

    fn detect(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        self.try_forward(pre, post)
    }

    fn input_channels(&self) -> usize {
        self.input_nc
    }

    fn output_channels(&self) -> usize {
        self.head.classifier.conv2.weight.val().dims()[0]
    }

    fn emits_probabilities(&self) -> bool {
        self.head.output_sigmoid
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary::new(Architecture::Baseline.to_string(), self.components())
    }
}

impl<B: Backend> ChangeDetector<B> for BitModel<B> {
    fn architecture(&self) -> Architecture {
        Architecture::Bit
    }

    fn detect(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        self.try_forward(pre, post)
    }

    fn input_channels(&self) -> usize {
        self.input_nc
    }

    fn output_channels(&self) -> usize {
        self.head.classifier.conv2.weight.val().dims()[0]
    }

    fn emits_probabilities(&self) -> bool {
        self.head.output_sigmoid
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary::new(Architecture::Bit.to_string(), self.components())
    }
}

/// Serialisable choice of detector, tagged by `architecture`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "architecture", rename_all = "snake_case")]
pub enum DetectorConfig {
    Baseline(SiameseResNetConfig),
    Bit(BitModelConfig),
}

impl DetectorConfig {
    pub fn architecture(&self) -> Architecture {
        match self {
            Self::Baseline(_) => Architecture::Baseline,
            Self::Bit(_)      => Architecture::Bit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Baseline(cfg) => cfg.validate(),
            Self::Bit(cfg)      => cfg.validate(),
        }
    }

    /// Square input side the model was sized for.
    pub fn image_size(&self) -> usize {
        match self {
            Self::Baseline(cfg) => cfg.extractor.image_size,
            Self::Bit(cfg)      => cfg.extractor.image_size,
        }
    }

    pub fn input_channels(&self) -> usize {
        match self {
            Self::Baseline(cfg) => cfg.extractor.input_nc,
            Self::Bit(cfg)      => cfg.extractor.input_nc,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Detector<B>> {
        Ok(match self {
            Self::Baseline(cfg) => Detector::Baseline(cfg.init(device)?),
            Self::Bit(cfg)      => Detector::Bit(cfg.init(device)?),
        })
    }
}

/// A built detector of either architecture.
#[derive(Module, Debug)]
pub enum Detector<B: Backend> {
    Baseline(SiameseResNet<B>),
    Bit(BitModel<B>),
}

impl<B: Backend> Detector<B> {
    fn inner(&self) -> &dyn ChangeDetector<B> {
        match self {
            Self::Baseline(model) => model,
            Self::Bit(model)      => model,
        }
    }
}

impl<B: Backend> ChangeDetector<B> for Detector<B> {
    fn architecture(&self) -> Architecture {
        self.inner().architecture()
    }

    fn detect(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        self.inner().detect(pre, post)
    }

    fn input_channels(&self) -> usize {
        self.inner().input_channels()
    }

    fn output_channels(&self) -> usize {
        self.inner().output_channels()
    }

    fn emits_probabilities(&self) -> bool {
        self.inner().emits_probabilities()
    }

    fn summary(&self) -> ModelSummary {
        self.inner().summary()
    }
}
