// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Nearly all Burn code lives here. The domain layer never
// imports burn, so shapes and options can be checked without
// building a network.
//
// Building blocks, bottom-up:
//
//   backbone.rs    — ResNet18/34/50 truncated at 3..5 stages
//   resample.rs    — nearest / bilinear resizing
//   extractor.rs   — backbone + 3x3 projection to 32 channels
//   tokenizer.rs   — semantic (attention pooled) or grid-pooled tokens
//   attention.rs   — multi-head self/cross attention, feed-forward
//   transformer.rs — pre-norm token encoder and pixel decoder
//   position.rs    — sinusoidal and learned position tables
//   head.rs        — |a − b| → upsample → two-layer conv classifier
//
// Assemblies:
//
//   model.rs       — SiameseResNet baseline and BitModel
//   detector.rs    — ChangeDetector trait, DetectorConfig
//   predictor.rs   — probabilities, thresholds, reports
//
// Reference: Chen et al. (2021) Remote Sensing Image Change
//            Detection with Transformers
//            He et al. (2016) Deep Residual Learning

pub mod backbone;
pub mod resample;
pub mod extractor;
pub mod tokenizer;
pub mod attention;
pub mod transformer;
pub mod position;
pub mod head;

/// Baseline and BIT change detection models
pub mod model;

/// Common seam over both architectures
pub mod detector;

/// Turns raw change maps into masks and reports
pub mod predictor;

/// Backend used by the CLI.
#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

/// Backend used by the CLI.
#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray;
