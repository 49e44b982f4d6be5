// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe the change detection problem
// without touching the tensor framework.
//
// Rules for this layer:
//   - NO Burn types allowed here
//   - NO file I/O
//   - Only structs, enums, traits and shape arithmetic
//
// Everything that needs to reason about shapes before a model
// exists (config validation, positional table sizes, pooling
// windows) lives in `geometry` so it can be tested without a
// backend.

/// Architecture switches: backbone, positional encodings, tokenizers
pub mod options;

/// Shape arithmetic for the backbone, pooling and token counts
pub mod geometry;

/// A bi-temporal image pair in CHW layout
pub mod pair;

/// Model summaries, change masks and probe reports
pub mod report;

/// Core abstractions implemented by the data and infra layers
pub mod traits;
