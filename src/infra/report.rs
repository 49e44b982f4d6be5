// ============================================================
// Layer 6 — Report Writer
// ============================================================
// Persists model summaries and probe results.
//
// Output files:
//   <dir>/
//     summary.csv    ← one row per component, rewritten each time
//     summary.json   ← the full ModelSummary
//     probes.csv     ← one row per probe run, appended
//
// Example probes.csv:
//   architecture,batch,classes,height,width,threshold,mean_probability,changed_fraction
//   bit,4,1,256,256,0.500000,0.512345,0.498765

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::domain::report::{ChangeReport, ModelSummary};
use crate::domain::traits::ReportSink;

const PROBE_HEADER: &str =
    "architecture,batch,classes,height,width,threshold,mean_probability,changed_fraction";

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Create the output directory and the probe log header if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create report directory '{}'", dir.display()))?;

        let probes = dir.join("probes.csv");
        if !probes.exists() {
            let mut f = fs::File::create(&probes)?;
            writeln!(f, "{PROBE_HEADER}")?;
            tracing::debug!("Created probe log '{}'", probes.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn probes_path(&self) -> PathBuf {
        self.dir.join("probes.csv")
    }
}

impl ReportSink for ReportWriter {
    fn write_summary(&self, summary: &ModelSummary) -> Result<()> {
        let csv_path = self.dir.join("summary.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot write '{}'", csv_path.display()))?;
        writeln!(f, "component,parameters")?;
        for c in &summary.components {
            writeln!(f, "{},{}", c.name, c.parameters)?;
        }
        writeln!(f, "total,{}", summary.total_parameters)?;

        let json_path = self.dir.join("summary.json");
        fs::write(&json_path, serde_json::to_string_pretty(summary)?)
            .with_context(|| format!("Cannot write '{}'", json_path.display()))?;

        tracing::debug!("Wrote summary for {} to '{}'", summary.architecture, self.dir.display());
        Ok(())
    }

    fn append_probe(&self, report: &ChangeReport) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(self.probes_path())?;
        let shape = |i: usize| report.output_shape.get(i).copied().unwrap_or(0);
        writeln!(
            f,
            "{},{},{},{},{},{:.6},{:.6},{:.6}",
            report.architecture,
            shape(0),
            shape(1),
            shape(2),
            shape(3),
            report.threshold,
            report.mean_probability,
            report.changed_fraction,
        )?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ComponentSummary;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bit-cd-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn report(fraction: f64) -> ChangeReport {
        ChangeReport {
            architecture:     "bit".into(),
            output_shape:     vec![2, 1, 8, 8],
            threshold:        0.5,
            mean_probability: 0.25,
            changed_fraction: fraction,
            per_sample:       vec![fraction, fraction],
        }
    }

    #[test]
    fn test_probes_are_appended_under_one_header() {
        let dir = scratch_dir("report-probes");
        let writer = ReportWriter::new(&dir).unwrap();
        writer.append_probe(&report(0.1)).unwrap();
        // a second writer on the same directory keeps the existing log
        let writer = ReportWriter::new(&dir).unwrap();
        writer.append_probe(&report(0.2)).unwrap();

        let text = fs::read_to_string(writer.probes_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], PROBE_HEADER);
        assert_eq!(lines[2], "bit,2,1,8,8,0.500000,0.250000,0.200000");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_summary_files() {
        let dir = scratch_dir("report-summary");
        let writer = ReportWriter::new(&dir).unwrap();
        let summary = ModelSummary::new(
            "baseline",
            vec![
                ComponentSummary { name: "backbone".into(), parameters: 100 },
                ComponentSummary { name: "classifier".into(), parameters: 20 },
            ],
        );
        writer.write_summary(&summary).unwrap();

        let csv = fs::read_to_string(dir.join("summary.csv")).unwrap();
        assert!(csv.ends_with("total,120\n"));
        let json = fs::read_to_string(dir.join("summary.json")).unwrap();
        let back: ModelSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
        fs::remove_dir_all(dir).ok();
    }
}
