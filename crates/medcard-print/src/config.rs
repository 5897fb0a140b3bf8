use std::path::Path;

use medcard_envelope::{EccProfile, PresentationContext};
use serde::{Deserialize, Serialize};

use crate::PrintError;

/// How a card code is issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueConfig {
    /// Every context the code will be presented in; the strongest wins.
    pub contexts: Vec<PresentationContext>,
    /// Output pixels per module side.
    pub module_px: u32,
    /// Light border around the symbol, in modules.
    pub quiet_zone: u32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            contexts: vec![PresentationContext::Printed],
            module_px: 8,
            quiet_zone: 4,
        }
    }
}

impl IssueConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PrintError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PrintError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PrintError> {
        if !(1..=64).contains(&self.module_px) {
            return Err(PrintError::InvalidConfig(format!(
                "module_px must be in 1..=64 (got {})",
                self.module_px
            )));
        }
        if self.quiet_zone > 16 {
            return Err(PrintError::InvalidConfig(format!(
                "quiet_zone must be at most 16 modules (got {})",
                self.quiet_zone
            )));
        }
        Ok(())
    }

    pub fn profile(&self) -> EccProfile {
        EccProfile::for_contexts(&self.contexts)
    }
}
