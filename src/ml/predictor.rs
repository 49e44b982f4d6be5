// ============================================================
// Layer 5 — Change Predictor
// ============================================================
// Runs a detector on a batch and turns its raw output into
// change probabilities and binary masks.
//
//   1 channel,  logits        → sigmoid
//   1 channel,  probabilities → as is
//   k channels                → softmax over channels, keep the last
//                               ("changed") class
//
// Pixels at or above the threshold count as changed.

use std::marker::PhantomData;

use anyhow::{anyhow, ensure, Result};
use burn::{
    prelude::*,
    tensor::activation::{sigmoid, softmax},
};

use crate::data::batcher::PairBatch;
use crate::domain::report::{ChangeMask, ChangeReport};
use crate::ml::detector::ChangeDetector;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Masks for every sample plus the batch-level report.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub masks:  Vec<ChangeMask>,
    pub report: ChangeReport,
}

pub struct ChangePredictor<B: Backend, D: ChangeDetector<B>> {
    detector:  D,
    threshold: f32,
    _backend:  PhantomData<B>,
}

impl<B: Backend, D: ChangeDetector<B>> ChangePredictor<B, D> {
    pub fn new(detector: D, threshold: f32) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "threshold must be within [0, 1], got {threshold}"
        );
        Ok(Self { detector, threshold, _backend: PhantomData })
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Change probability per pixel, [batch, H, W], plus the raw output shape.
    pub fn probabilities(&self, batch: PairBatch<B>) -> Result<(Tensor<B, 3>, [usize; 4])> {
        let raw = self.detector.detect(batch.pre, batch.post)?;
        let dims = raw.dims();
        let [n, k, h, w] = dims;

        let probs = if k == 1 {
            if self.detector.emits_probabilities() { raw } else { sigmoid(raw) }
        } else {
            let scores = if self.detector.emits_probabilities() { raw } else { softmax(raw, 1) };
            scores.slice([0..n, k - 1..k, 0..h, 0..w])
        };
        Ok((probs.reshape([n, h, w]), dims))
    }

    pub fn predict(&self, batch: PairBatch<B>) -> Result<Prediction> {
        let (probs, dims) = self.probabilities(batch)?;
        let [n, _, h, w] = dims;
        let values = probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("reading change probabilities: {e:?}"))?;

        let masks: Vec<ChangeMask> = values
            .chunks(h * w)
            .map(|sample| ChangeMask::from_probabilities(h, w, sample, self.threshold))
            .collect();
        let per_sample: Vec<f64> = masks.iter().map(ChangeMask::changed_fraction).collect();

        let mean_probability = values.iter().map(|&v| v as f64).sum::<f64>() / values.len().max(1) as f64;
        let changed_fraction = per_sample.iter().sum::<f64>() / n.max(1) as f64;

        tracing::debug!(
            "Predicted {n} change maps, mean p={mean_probability:.4}, changed={changed_fraction:.4}"
        );

        let report = ChangeReport {
            architecture: self.detector.architecture().to_string(),
            output_shape: dims.to_vec(),
            threshold: self.threshold,
            mean_probability,
            changed_fraction,
            per_sample,
        };
        Ok(Prediction { masks, report })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::domain::options::Architecture;
    use crate::domain::report::ModelSummary;

    type TestBackend = NdArray;

    /// Returns a fixed map regardless of input.
    struct FixedDetector {
        map:           Vec<f32>,
        shape:         [usize; 4],
        probabilities: bool,
    }

    impl ChangeDetector<TestBackend> for FixedDetector {
        fn architecture(&self) -> Architecture {
            Architecture::Baseline
        }

        fn detect(
            &self,
            pre: Tensor<TestBackend, 4>,
            _post: Tensor<TestBackend, 4>,
        ) -> Result<Tensor<TestBackend, 4>> {
            Ok(Tensor::from_data(TensorData::new(self.map.clone(), self.shape), &pre.device()))
        }

        fn input_channels(&self) -> usize {
            1
        }

        fn output_channels(&self) -> usize {
            self.shape[1]
        }

        fn emits_probabilities(&self) -> bool {
            self.probabilities
        }

        fn summary(&self) -> ModelSummary {
            ModelSummary::new("fixed", Vec::new())
        }
    }

    fn batch(n: usize) -> PairBatch<TestBackend> {
        let device = Default::default();
        PairBatch {
            pre:  Tensor::zeros([n, 1, 2, 2], &device),
            post: Tensor::zeros([n, 1, 2, 2], &device),
        }
    }

    #[test]
    fn test_single_channel_logits_go_through_sigmoid() {
        let detector = FixedDetector {
            map:           vec![-10.0, 0.0, 10.0, 10.0],
            shape:         [1, 1, 2, 2],
            probabilities: false,
        };
        let prediction = ChangePredictor::<TestBackend, _>::new(detector, DEFAULT_THRESHOLD)
            .unwrap()
            .predict(batch(1))
            .unwrap();
        // sigmoid(0) sits exactly on the threshold and counts as changed
        assert_eq!(prediction.masks[0].pixels, vec![false, true, true, true]);
        assert!((prediction.report.changed_fraction - 0.75).abs() < 1e-9);
        assert_eq!(prediction.report.output_shape, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_probabilities_are_not_squashed_twice() {
        let detector = FixedDetector {
            map:           vec![0.1, 0.2, 0.6, 0.9],
            shape:         [1, 1, 2, 2],
            probabilities: true,
        };
        let predictor = ChangePredictor::<TestBackend, _>::new(detector, 0.5).unwrap();
        let prediction = predictor.predict(batch(1)).unwrap();
        assert!((prediction.report.mean_probability - 0.45).abs() < 1e-6);
        assert_eq!(prediction.masks[0].changed_pixels(), 2);
    }

    #[test]
    fn test_multi_class_keeps_last_channel() {
        // two samples, two classes; class 1 wins where its score is larger
        let detector = FixedDetector {
            map: vec![
                0.0, 0.0, 5.0, -5.0, // sample 0, class 0
                1.0, 0.0, 0.0, 0.0,  // sample 0, class 1
                0.0, 0.0, 0.0, 0.0,  // sample 1, class 0
                9.0, 9.0, 9.0, 9.0,  // sample 1, class 1
            ],
            shape: [2, 2, 2, 2],
            probabilities: false,
        };
        let prediction = ChangePredictor::<TestBackend, _>::new(detector, 0.5).unwrap().predict(batch(2)).unwrap();
        assert_eq!(prediction.masks[0].pixels, vec![true, true, false, true]);
        assert_eq!(prediction.report.per_sample, vec![0.75, 1.0]);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let detector = FixedDetector { map: vec![0.0; 4], shape: [1, 1, 2, 2], probabilities: true };
        assert!(ChangePredictor::<TestBackend, _>::new(detector, 1.5).is_err());
    }
}
