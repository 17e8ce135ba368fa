//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level
//! updates. Every field carries a serde default so partial files load
//! cleanly.

use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;
use crate::models::{CalibrationConfig, StackingConfig};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Seed values for a run's calibration and stacking configs.
    #[serde(default)]
    pub defaults: RunDefaults,
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Last used working directory.
    #[serde(default)]
    pub last_directory: String,

    /// Folder for run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            last_directory: String::new(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress line step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of engine output lines kept for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,

    /// Show timestamps in log files.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> usize {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

impl LoggingSettings {
    /// Convert to a run logger configuration.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail,
            show_timestamps: self.show_timestamps,
            ..LogConfig::default()
        }
    }
}

/// Seed values for run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Synthetic bias coefficient.
    #[serde(default = "default_bias_coefficient")]
    pub bias_coefficient: f64,

    /// Use flat frames.
    #[serde(default = "default_true")]
    pub use_flats: bool,

    /// Debayer (one-shot-colour camera).
    #[serde(default = "default_true")]
    pub debayer: bool,

    /// Low sigma rejection threshold.
    #[serde(default = "default_sigma")]
    pub sigma_low: f64,

    /// High sigma rejection threshold.
    #[serde(default = "default_sigma")]
    pub sigma_high: f64,

    /// Output histogram normalization.
    #[serde(default = "default_true")]
    pub output_normalization: bool,

    /// Per-channel equalization.
    #[serde(default = "default_true")]
    pub rgb_equalization: bool,
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

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            bias_coefficient: default_bias_coefficient(),
            use_flats: true,
            debayer: true,
            sigma_low: default_sigma(),
            sigma_high: default_sigma(),
            output_normalization: true,
            rgb_equalization: true,
        }
    }
}

impl RunDefaults {
    /// Build a calibration config from the defaults.
    pub fn calibration(&self) -> CalibrationConfig {
        CalibrationConfig {
            bias_coefficient: self.bias_coefficient,
            use_flats: self.use_flats,
            debayer: self.debayer,
        }
    }

    /// Build a stacking config from the defaults.
    pub fn stacking(&self) -> StackingConfig {
        StackingConfig {
            sigma_low: self.sigma_low,
            sigma_high: self.sigma_high,
            normalize_output: self.output_normalization,
            rgb_equalize: self.rgb_equalization,
        }
    }
}

/// Identifies one settings section for section-level updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Defaults,
}

impl ConfigSection {
    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Defaults => "defaults",
        }
    }
}
