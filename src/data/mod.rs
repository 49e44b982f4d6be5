// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between "some pixels" and "tensors on a device".
//
//   SyntheticPairSource → seeded noise pairs with a planted change
//       │
//       ▼
//   Normalizer          → (x − mean) / std per channel
//       │
//       ▼
//   PairBatcher         → stacks pairs into [N, C, H, W] tensors
//
// A real image reader would slot in as another PairSource.

/// Stacks image pairs into tensor batches
pub mod batcher;

/// Per-channel standardisation
pub mod normalize;

/// Seeded pair generator for probing models
pub mod synthetic;
