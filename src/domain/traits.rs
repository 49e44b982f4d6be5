// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so the
// synthetic pair generator can be swapped for a real image
// reader and the file reports for any other sink without
// touching the use cases.

use anyhow::Result;

use crate::domain::pair::ImagePair;
use crate::domain::report::{ChangeReport, ModelSummary};

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Anything that can hand out bi-temporal image pairs.
///
/// Implementations:
///   - SyntheticPairSource → seeded noise with a planted change
pub trait PairSource {
    /// Produce `count` pairs, all with the same shape.
    fn next_pairs(&mut self, count: usize) -> Result<Vec<ImagePair>>;
}

// ─── ReportSink ───────────────────────────────────────────────────────────────
/// Anything that can persist summaries and probe reports.
///
/// Implementations:
///   - ReportWriter → CSV and JSON files in a directory
pub trait ReportSink {
    fn write_summary(&self, summary: &ModelSummary) -> Result<()>;

    fn append_probe(&self, report: &ChangeReport) -> Result<()>;
}
