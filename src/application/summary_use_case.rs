// ============================================================
// Layer 2 — SummaryUseCase
// ============================================================
// Builds a detector from its config and reports how many
// parameters each component holds:
//
//   Step 1: Validate the config            (Layer 5 - ml)
//   Step 2: Build the detector on a device (Layer 5 - ml)
//   Step 3: Count parameters per component (Layer 5 - ml)
//   Step 4: Hand the summary to a sink     (Layer 6 - infra)

use anyhow::{Context, Result};
use burn::prelude::Backend;

use crate::domain::report::ModelSummary;
use crate::domain::traits::ReportSink;
use crate::ml::detector::{ChangeDetector, DetectorConfig};

pub struct SummaryUseCase {
    config: DetectorConfig,
}

impl SummaryUseCase {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: Backend>(
        &self,
        device: &B::Device,
        sink:   Option<&dyn ReportSink>,
    ) -> Result<ModelSummary> {
        self.config.validate()?;
        tracing::info!("Building {} detector", self.config.architecture());

        let detector = self
            .config
            .init::<B>(device)
            .context("Failed to build detector")?;
        let summary = detector.summary();
        tracing::info!(
            "{} has {} parameters in {} components",
            summary.architecture,
            summary.total_parameters,
            summary.components.len()
        );

        if let Some(sink) = sink {
            sink.write_summary(&summary)?;
        }
        Ok(summary)
    }
}
