//! Configuration
//!
//! `SenseConfig` is read from TOML. Every field has a default, so an empty
//! file (or no file) gives the stock setup: log to `logs/results.csv`, persist
//! every 30th frame, normalize frames to 640x480.

use crate::error::SenseError;
use crate::observation_log::DEFAULT_LOG_PATH;
use crate::report::DEFAULT_RECENT_WINDOW;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Frames between persisted observations (about one second at 30 FPS)
pub const DEFAULT_SAMPLE_EVERY: u64 = 30;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenseConfig {
    /// Observation log location
    pub log_path: PathBuf,
    /// Persist one observation every N processed frames
    pub sample_every: u64,
    /// Rows kept in the "recent" section of reports
    pub recent_window: usize,
    pub frame: FrameConfig,
}

/// Frame normalization applied before scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub resize: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            sample_every: DEFAULT_SAMPLE_EVERY,
            recent_window: DEFAULT_RECENT_WINDOW,
            frame: FrameConfig::default(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            resize: true,
            width: 640,
            height: 480,
        }
    }
}

impl SenseConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, SenseError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML
    pub fn from_toml_str(raw: &str) -> Result<Self, SenseError> {
        let config: SenseConfig =
            toml::from_str(raw).map_err(|e| SenseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SenseError> {
        if self.sample_every == 0 {
            return Err(SenseError::Config(
                "sample_every must be at least 1".to_string(),
            ));
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(SenseError::Config(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame.width, self.frame.height
            )));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, SenseError> {
        toml::to_string_pretty(self).map_err(|e| SenseError::Config(e.to_string()))
    }
}
