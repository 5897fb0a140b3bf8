//! JSON configuration for the scanning engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::StreamConstraints;
use crate::overlay::OverlayParams;

#[derive(thiserror::Error, Debug)]
pub enum ScannerConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("tick interval must be between 10 and 1000 ms (got {0})")]
    TickInterval(u64),
}

fn default_tick_interval_ms() -> u64 {
    150
}

fn default_notice_ms() -> u64 {
    3000
}

/// Scanner settings. Every field has a default, so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub constraints: StreamConstraints,
    #[serde(default)]
    pub overlay: OverlayParams,
    /// How long a capability notice stays visible.
    #[serde(default = "default_notice_ms")]
    pub notice_ms: u64,
    /// Directory of the file-backed scan history.
    #[serde(default)]
    pub history_dir: Option<String>,
    /// Preferred camera id; the default device is used when absent.
    #[serde(default)]
    pub device_id: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            constraints: StreamConstraints::default(),
            overlay: OverlayParams::default(),
            notice_ms: default_notice_ms(),
            history_dir: None,
            device_id: None,
        }
    }
}

impl ScannerConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScannerConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ScannerConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScannerConfigError> {
        if !(10..=1000).contains(&self.tick_interval_ms) {
            return Err(ScannerConfigError::TickInterval(self.tick_interval_ms));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    /// Resolve the history directory, defaulting to `./medcard-history`.
    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("medcard-history"))
    }
}
