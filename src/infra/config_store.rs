// ============================================================
// Layer 6 — Config Store
// ============================================================
// Saves and restores a DetectorConfig as pretty JSON so a model
// can be rebuilt with exactly the same architecture later.
//
// File layout:
//   <dir>/
//     detector_config.json   ← architecture tag + all hyperparameters
//
// Example:
//   {
//     "architecture": "bit",
//     "extractor": { "backbone": "resnet18", "stages": 4, ... },
//     "token_len": 4,
//     "with_pos": "learned",
//     ...
//   }

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::detector::DetectorConfig;

pub const CONFIG_FILE: &str = "detector_config.json";

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Validate and write the config, creating the directory if needed.
    pub fn save(&self, cfg: &DetectorConfig) -> Result<PathBuf> {
        cfg.validate().context("Refusing to save an invalid detector config")?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved {} config to '{}'", cfg.architecture(), path.display());
        Ok(path)
    }

    pub fn load(&self) -> Result<DetectorConfig> {
        Self::load_file(&self.path())
    }

    /// Read and validate a config from an explicit file path.
    pub fn load_file(path: &Path) -> Result<DetectorConfig> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let cfg: DetectorConfig = serde_json::from_str(&json)
            .with_context(|| format!("Config '{}' is not a valid detector config", path.display()))?;
        cfg.validate()
            .with_context(|| format!("Config '{}' failed validation", path.display()))?;
        Ok(cfg)
    }
}
