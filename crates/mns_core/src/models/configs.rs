//! Configuration records for one workflow run.
//!
//! Both records are supplied once at workflow start and are immutable for the
//! duration of the run. Validation happens before the first engine command is
//! issued, never mid-run.

use serde::{Deserialize, Serialize};

/// Per-set calibration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Multiplier for the sensor OFFSET metadata value. The engine evaluates
    /// `coefficient * $OFFSET` as a synthetic bias, so no physical bias
    /// frames are required.
    #[serde(default = "default_bias_coefficient")]
    pub bias_coefficient: f64,

    /// Build a master flat from each set's `flats/` folder.
    #[serde(default = "default_true")]
    pub use_flats: bool,

    /// Bayer-pattern handling for one-shot-colour cameras (CFA flags,
    /// CFA equalization, and debayering during light calibration).
    #[serde(default = "default_true")]
    pub debayer: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bias_coefficient: default_bias_coefficient(),
            use_flats: true,
            debayer: true,
        }
    }
}

impl CalibrationConfig {
    /// Check the record before any engine command is assembled from it.
    pub fn validate(&self) -> Result<(), String> {
        if !self.bias_coefficient.is_finite() || self.bias_coefficient < 0.0 {
            return Err(format!(
                "bias coefficient must be finite and non-negative, got {}",
                self.bias_coefficient
            ));
        }
        Ok(())
    }
}

/// Rejection-stacking parameters for the final combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackingConfig {
    /// Low sigma threshold for pixel rejection.
    #[serde(default = "default_sigma")]
    pub sigma_low: f64,

    /// High sigma threshold for pixel rejection.
    #[serde(default = "default_sigma")]
    pub sigma_high: f64,

    /// Request output histogram normalization in addition to the always-on
    /// additive-scale input normalization.
    #[serde(default = "default_true")]
    pub normalize_output: bool,

    /// Request per-channel equalization (colour images).
    #[serde(default = "default_true")]
    pub rgb_equalize: bool,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            sigma_low: default_sigma(),
            sigma_high: default_sigma(),
            normalize_output: true,
            rgb_equalize: true,
        }
    }
}

impl StackingConfig {
    /// Check the record before any engine command is assembled from it.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("sigma low", self.sigma_low), ("sigma high", self.sigma_high)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be finite and > 0, got {}", name, value));
            }
        }
        Ok(())
    }
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
