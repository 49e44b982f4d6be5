// ============================================================
// Layer 3 — Reports
// ============================================================
// Plain data produced by the summary and probe use cases.
// They are serialisable so the infra layer can write them to
// CSV and JSON without knowing where they came from.

use serde::{Deserialize, Serialize};

/// Parameter count of one named component of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name:       String,
    pub parameters: usize,
}

/// Per-component parameter table of a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub architecture:     String,
    pub components:       Vec<ComponentSummary>,
    pub total_parameters: usize,
}

impl ModelSummary {
    /// Build a summary; the total is the sum of the component counts.
    pub fn new(architecture: impl Into<String>, components: Vec<ComponentSummary>) -> Self {
        let total_parameters = components.iter().map(|c| c.parameters).sum();
        Self { architecture: architecture.into(), components, total_parameters }
    }

    /// Parameter count of a component by name, if present.
    pub fn parameters_of(&self, name: &str) -> Option<usize> {
        self.components.iter().find(|c| c.name == name).map(|c| c.parameters)
    }
}

/// Binary change mask for one image pair, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMask {
    pub height: usize,
    pub width:  usize,
    pub pixels: Vec<bool>,
}

impl ChangeMask {
    /// Threshold a row-major probability map.
    pub fn from_probabilities(height: usize, width: usize, probs: &[f32], threshold: f32) -> Self {
        let pixels = probs.iter().map(|&p| p >= threshold).collect();
        Self { height, width, pixels }
    }

    pub fn changed_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// Fraction of pixels marked as changed, 0.0 for an empty mask.
    pub fn changed_fraction(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.changed_pixels() as f64 / self.pixels.len() as f64
    }
}

/// Outcome of running a detector over one batch of pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub architecture:     String,
    /// Raw output shape `[batch, classes, height, width]`
    pub output_shape:     Vec<usize>,
    pub threshold:        f32,
    pub mean_probability: f64,
    pub changed_fraction: f64,
    /// Changed fraction of every sample in the batch
    pub per_sample:       Vec<f64>,
}
