//! Configuration for rinkpilot-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Perception network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Encoder channel progression, one entry per downsampling stage
    pub channels: Vec<usize>,
    /// Number of upsampling stages, mirrored from the deepest encoder levels
    pub decoder_depth: usize,
    /// Trained input height in pixels
    pub input_height: u32,
    /// Trained input width in pixels
    pub input_width: u32,
    /// Serialized parameter blob
    pub model_path: PathBuf,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".rinkpilot");
                p.push("models");
                p.push("planner.bin");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models/planner.bin"));

        Self {
            channels: vec![16, 32, 64, 128],
            decoder_depth: 2,
            input_height: 96,
            input_width: 128,
            model_path,
        }
    }
}

impl PerceptionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.is_empty() {
            return Err("channels must name at least one encoder stage".to_string());
        }

        if self.channels.iter().any(|&c| c == 0 || c > 4096) {
            return Err("every encoder stage needs between 1 and 4096 channels".to_string());
        }

        if self.decoder_depth > self.channels.len() {
            return Err(format!(
                "decoder_depth {} exceeds the {} encoder stages",
                self.decoder_depth,
                self.channels.len()
            ));
        }

        if self.input_height == 0 || self.input_width == 0 {
            return Err("Input resolution must be non-zero".to_string());
        }

        if self.input_height > 2160 || self.input_width > 3840 {
            return Err("Input resolution too large (max 4K)".to_string());
        }

        Ok(())
    }

    /// Output channels of each upsampling stage, deepest first.
    pub fn decoder_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels.iter().rev().take(self.decoder_depth).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PerceptionConfig::default();
        assert_eq!(config.channels, vec![16, 32, 64, 128]);
        assert_eq!(config.decoder_depth, 2);
        assert_eq!((config.input_height, config.input_width), (96, 128));
        assert!(config.model_path.ends_with("planner.bin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decoder_is_shallower_than_encoder() {
        let config = PerceptionConfig::default();
        let decoder: Vec<usize> = config.decoder_channels().collect();
        assert_eq!(decoder, vec![128, 64]);
    }

    #[test]
    fn test_config_validation_empty_channels() {
        let mut config = PerceptionConfig::default();
        config.channels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_channel() {
        let mut config = PerceptionConfig::default();
        config.channels = vec![16, 0, 64];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_decoder_too_deep() {
        let mut config = PerceptionConfig::default();
        config.decoder_depth = 5;
        assert!(config.validate().is_err());

        config.decoder_depth = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_resolution() {
        let mut config = PerceptionConfig::default();
        config.input_width = 0;
        assert!(config.validate().is_err());

        config.input_width = 3841;
        assert!(config.validate().is_err());
    }
}
