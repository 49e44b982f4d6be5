// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File I/O that the other layers should not care about:
//
//   config_store.rs — DetectorConfig saved and loaded as pretty
//                     JSON, so a model can be rebuilt later with
//                     the same architecture.
//
//   report.rs       — ReportWriter, the file-backed ReportSink:
//                     parameter summaries as CSV + JSON and an
//                     append-only CSV log of probe runs.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Rust Book §12 (I/O and File Handling)

/// Detector config persistence
pub mod config_store;

/// CSV / JSON report files
pub mod report;
