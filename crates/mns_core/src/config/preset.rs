//! Named preset snapshots.
//!
//! A preset is an opaque JSON record of sequence name + calibration +
//! stacking settings. Field names match the original tool's preset files, so
//! existing presets keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::manager::{atomic_write, ConfigError, ConfigResult};
use crate::models::{CalibrationConfig, StackingConfig};

/// A named snapshot of one run's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Name for the combined sequence.
    #[serde(default = "default_sequence_name")]
    pub sequence_name: String,

    /// Synthetic bias coefficient.
    #[serde(default = "default_bias_coefficient")]
    pub bias_coefficient: f64,

    /// Use flat frames.
    #[serde(default = "default_true")]
    pub use_flats: bool,

    /// Debayer (one-shot-colour camera).
    #[serde(default = "default_true")]
    pub debayer: bool,

    /// High sigma rejection threshold.
    #[serde(default = "default_sigma")]
    pub sigma_high: f64,

    /// Low sigma rejection threshold.
    #[serde(default = "default_sigma")]
    pub sigma_low: f64,

    /// Output histogram normalization.
    #[serde(default = "default_true")]
    pub output_normalization: bool,

    /// Per-channel equalization.
    #[serde(default = "default_true")]
    pub rgb_equalization: bool,
}

/// Today's date in `YYYYMMDD_seq` form.
pub fn default_sequence_name() -> String {
    chrono::Local::now().format("%Y%m%d_seq").to_string()
}

fn default_bias_coefficient() -> f64 {
    8.0
}

fn default_sigma() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            sequence_name: default_sequence_name(),
            bias_coefficient: default_bias_coefficient(),
            use_flats: true,
            debayer: true,
            sigma_high: default_sigma(),
            sigma_low: default_sigma(),
            output_normalization: true,
            rgb_equalization: true,
        }
    }
}

impl Preset {
    /// Snapshot the given run configuration.
    pub fn from_configs(
        sequence_name: impl Into<String>,
        calibration: &CalibrationConfig,
        stacking: &StackingConfig,
    ) -> Self {
        Self {
            sequence_name: sequence_name.into(),
            bias_coefficient: calibration.bias_coefficient,
            use_flats: calibration.use_flats,
            debayer: calibration.debayer,
            sigma_high: stacking.sigma_high,
            sigma_low: stacking.sigma_low,
            output_normalization: stacking.normalize_output,
            rgb_equalization: stacking.rgb_equalize,
        }
    }

    /// Calibration config carried by this preset.
    pub fn calibration(&self) -> CalibrationConfig {
        CalibrationConfig {
            bias_coefficient: self.bias_coefficient,
            use_flats: self.use_flats,
            debayer: self.debayer,
        }
    }

    /// Stacking config carried by this preset.
    pub fn stacking(&self) -> StackingConfig {
        StackingConfig {
            sigma_low: self.sigma_low,
            sigma_high: self.sigma_high,
            normalize_output: self.output_normalization,
            rgb_equalize: self.rgb_equalization,
        }
    }

    /// Load a preset from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the preset to a JSON file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        atomic_write(path.as_ref(), &content)?;
        Ok(())
    }
}
