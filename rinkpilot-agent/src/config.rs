//! Agent configuration: perception, control and the frame budget.

use rinkpilot_core::{Error, Result};
use rinkpilot_drive::ControlConfig;
use rinkpilot_eye::PerceptionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_MODEL_PATH: &str = "RINKPILOT_MODEL_PATH";
pub const ENV_FRAME_BUDGET_MS: &str = "RINKPILOT_FRAME_BUDGET_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub perception: PerceptionConfig,
    pub control: ControlConfig,
    /// Soft deadline for one full frame, perception included
    pub frame_budget_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            perception: PerceptionConfig::default(),
            control: ControlConfig::default(),
            frame_budget_ms: 100,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read config {:?}: {}", path, e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON first and TOML second
    pub fn from_str(content: &str) -> Result<Self> {
        let config = match serde_json::from_str::<AgentConfig>(content) {
            Ok(config) => config,
            Err(json_err) => toml::from_str::<AgentConfig>(content).map_err(|toml_err| {
                Error::Configuration(format!(
                    "config is neither JSON ({}) nor TOML ({})",
                    json_err, toml_err
                ))
            })?,
        };
        config.validate().map_err(Error::Configuration)?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_MODEL_PATH).filter(|p| !p.is_empty()) {
            self.perception.model_path = PathBuf::from(path);
        }

        if let Some(budget) = lookup(ENV_FRAME_BUDGET_MS) {
            if let Ok(ms) = budget.trim().parse::<u64>() {
                self.frame_budget_ms = ms;
            }
        }
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.perception.validate()?;
        self.control.validate()?;

        if self.frame_budget_ms == 0 {
            return Err("frame_budget_ms must be > 0".to_string());
        }

        Ok(())
    }
}
