// ============================================================
// Layer 3 — Architecture Options
// ============================================================
// The switches that select between architecture variants.
// They are serialised in snake_case inside model configs and
// parsed from their short names on the command line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Convolutional backbone used as the shared feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backbone {
    #[serde(rename = "resnet18")]
    ResNet18,
    #[serde(rename = "resnet34")]
    ResNet34,
    #[serde(rename = "resnet50")]
    ResNet50,
}

impl FromStr for Backbone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resnet18" => Ok(Self::ResNet18),
            "resnet34" => Ok(Self::ResNet34),
            "resnet50" => Ok(Self::ResNet50),
            other => Err(format!(
                "unknown backbone '{other}' (expected resnet18, resnet34 or resnet50)"
            )),
        }
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet34 => "resnet34",
            Self::ResNet50 => "resnet50",
        };
        f.write_str(name)
    }
}

/// How position information is injected before attention.
///
/// `Fixed` uses a sinusoidal table, `Learned` a trainable
/// parameter drawn from N(0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionalEncoding {
    None,
    Fixed,
    Learned,
}

impl PositionalEncoding {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for PositionalEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "fix" | "fixed" => Ok(Self::Fixed),
            "learned" => Ok(Self::Learned),
            other => Err(format!(
                "unknown positional encoding '{other}' (expected none, fixed or learned)"
            )),
        }
    }
}

impl fmt::Display for PositionalEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None    => "none",
            Self::Fixed   => "fixed",
            Self::Learned => "learned",
        };
        f.write_str(name)
    }
}

/// How a feature map is turned into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Learned spatial attention maps, one per token
    Semantic,
    /// Adaptive pooling to a fixed grid, one token per cell
    Pooled,
}

impl FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "pooled" | "pool" => Ok(Self::Pooled),
            other => Err(format!(
                "unknown tokenizer '{other}' (expected semantic or pooled)"
            )),
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semantic => "semantic",
            Self::Pooled   => "pooled",
        })
    }
}

/// Reduction used by the pooled tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    Max,
    Average,
}

impl FromStr for PoolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "ave" | "avg" | "average" => Ok(Self::Average),
            other => Err(format!("unknown pool mode '{other}' (expected max or ave)")),
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Max     => "max",
            Self::Average => "ave",
        })
    }
}

/// Which detector to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Siamese ResNet with feature differencing, no tokens
    Baseline,
    /// Full bi-temporal image transformer
    Bit,
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" | "resnet" => Ok(Self::Baseline),
            "bit" | "transformer" => Ok(Self::Bit),
            other => Err(format!("unknown architecture '{other}' (expected baseline or bit)")),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Baseline => "baseline",
            Self::Bit      => "bit",
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backbone_names() {
        assert_eq!("resnet18".parse::<Backbone>(), Ok(Backbone::ResNet18));
        assert_eq!("ResNet50".parse::<Backbone>(), Ok(Backbone::ResNet50));
        assert!("vgg16".parse::<Backbone>().is_err());
    }

    #[test]
    fn test_short_spellings_are_accepted() {
        // "fix" and "ave" appear in published BIT configs
        assert_eq!("fix".parse::<PositionalEncoding>(), Ok(PositionalEncoding::Fixed));
        assert_eq!("ave".parse::<PoolMode>(), Ok(PoolMode::Average));
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for b in [Backbone::ResNet18, Backbone::ResNet34, Backbone::ResNet50] {
            assert_eq!(b.to_string().parse::<Backbone>(), Ok(b));
        }
        for p in [PositionalEncoding::None, PositionalEncoding::Fixed, PositionalEncoding::Learned] {
            assert_eq!(p.to_string().parse::<PositionalEncoding>(), Ok(p));
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Backbone::ResNet34).unwrap();
        assert_eq!(json, "\"resnet34\"");
        let back: Backbone = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Backbone::ResNet34);
        assert!(!PositionalEncoding::None.is_enabled());
        assert!(PositionalEncoding::Learned.is_enabled());
    }
}
