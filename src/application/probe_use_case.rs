// ============================================================
// Layer 2 — ProbeUseCase
// ============================================================
// Pushes a batch of image pairs through a freshly built detector
// and reports what comes out:
//
//   Step 1: Draw pairs from a PairSource        (Layer 4 - data)
//   Step 2: Normalise with mean = std = 0.5     (Layer 4 - data)
//   Step 3: Stack into tensors                  (Layer 4 - data)
//   Step 4: Build the detector                  (Layer 5 - ml)
//   Step 5: Predict probabilities and masks     (Layer 5 - ml)
//   Step 6: Append the report to a sink         (Layer 6 - infra)
//
// Weights are random, so the numbers only say that the network
// runs end to end and what shape it produces.

use anyhow::{ensure, Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::PairBatcher,
    normalize::{Normalizer, DEFAULT_MEAN, DEFAULT_STD},
};
use crate::domain::traits::{PairSource, ReportSink};
use crate::ml::detector::{ChangeDetector, DetectorConfig};
use crate::ml::predictor::{ChangePredictor, Prediction};

// ─── Probe Configuration ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub batch_size: usize,
    pub threshold:  f32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { batch_size: 2, threshold: 0.5 }
    }
}

// ─── ProbeUseCase ─────────────────────────────────────────────────────────────
pub struct ProbeUseCase {
    detector: DetectorConfig,
    config:   ProbeConfig,
}

impl ProbeUseCase {
    pub fn new(detector: DetectorConfig, config: ProbeConfig) -> Self {
        Self { detector, config }
    }

    pub fn execute<B: Backend>(
        &self,
        device: &B::Device,
        source: &mut dyn PairSource,
        sink:   Option<&dyn ReportSink>,
    ) -> Result<Prediction> {
        ensure!(self.config.batch_size > 0, "batch size must be positive");
        self.detector.validate()?;

        // ── Step 1-3: pairs → normalised tensors ─────────────────────────────
        let pairs = source.next_pairs(self.config.batch_size)?;
        let channels = self.detector.input_channels();
        let normalizer = Normalizer::uniform(channels, DEFAULT_MEAN, DEFAULT_STD)?;
        let pairs = normalizer
            .apply_all(pairs)
            .context("Pairs do not match the detector's input channels")?;
        let batch = PairBatcher::<B>::new(device.clone()).batch(pairs)?;
        tracing::info!("Probing with input batch {:?}", batch.pre.dims());

        // ── Step 4-5: build and run ──────────────────────────────────────────
        let detector = self.detector.init::<B>(device)?;
        tracing::info!(
            "Built {} detector ({} parameters)",
            detector.architecture(),
            detector.summary().total_parameters
        );
        let predictor = ChangePredictor::<B, _>::new(detector, self.config.threshold)?;
        let prediction = predictor.predict(batch)?;
        tracing::info!("out.shape: {:?}", prediction.report.output_shape);

        // ── Step 6: report ───────────────────────────────────────────────────
        if let Some(sink) = sink {
            sink.append_probe(&prediction.report)?;
        }
        Ok(prediction)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::data::synthetic::SyntheticPairSource;
    use crate::ml::extractor::FeatureExtractorConfig;
    use crate::ml::model::{BitModelConfig, SiameseResNetConfig};

    #[test]
    fn test_probe_reports_input_sized_maps() {
        let device = Default::default();
        let mut source = SyntheticPairSource::new(42, 3, 32, 32, 0.25).unwrap();
        let probe = ProbeUseCase::new(
            DetectorConfig::Bit(BitModelConfig::for_image(32, 4)),
            ProbeConfig { batch_size: 3, threshold: 0.5 },
        );
        let prediction = probe.execute::<NdArray>(&device, &mut source, None).unwrap();
        assert_eq!(prediction.report.output_shape, vec![3, 1, 32, 32]);
        assert_eq!(prediction.masks.len(), 3);
        assert_eq!(prediction.report.per_sample.len(), 3);
        assert!((0.0..=1.0).contains(&prediction.report.mean_probability));
    }

    #[test]
    fn test_probe_rejects_channel_mismatch() {
        let device = Default::default();
        let mut source = SyntheticPairSource::new(1, 1, 32, 32, 0.25).unwrap();
        let probe = ProbeUseCase::new(
            DetectorConfig::Baseline(
                SiameseResNetConfig::new()
                    .with_extractor(FeatureExtractorConfig::new().with_image_size(32)),
            ),
            ProbeConfig::default(),
        );
        assert!(probe.execute::<NdArray>(&device, &mut source, None).is_err());
    }
}
