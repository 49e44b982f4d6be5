// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer strings the other layers together to get one job
// done: describe a model, or run one on some image pairs.
//
// Rules for this layer:
//   - No model code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - No file access (that's Layer 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Parameter counts per component
pub mod summary_use_case;

// Forward pass over a batch of pairs
pub mod probe_use_case;
