//! Builders for the registration and stacking commands.
//!
//! Registration runs over the full combined sequence; the final stack rejects
//! outliers with two independent sigma thresholds. Both builders are pure
//! functions from configuration to an immutable ordered token list.

use std::path::{Path, PathBuf};

use crate::engine::EngineCommand;
use crate::models::StackingConfig;

/// Prefix the engine gives registered sequences.
const REGISTERED_PREFIX: &str = "r_";

/// Registration over the full combined sequence.
///
/// Must only be issued after combination completed; registering a partially
/// linked sequence is undefined.
pub fn register_command(seq_name: &str) -> EngineCommand {
    EngineCommand::new(["register", seq_name])
}

/// Path of the final stacked artifact for a run.
pub fn stacked_artifact(workdir: &Path, seq_name: &str) -> PathBuf {
    workdir.join(format!("{}_stacked.fit", seq_name))
}

/// Builder for the final rejection-stack command.
///
/// Token order matches the engine syntax: sequence, rejection method and
/// thresholds, always-on additive-scale normalization, the independent
/// optional flags, then the output path (one level up from the combined
/// folder, i.e. the working directory).
pub struct StackCommandBuilder<'a> {
    config: &'a StackingConfig,
    seq_name: &'a str,
}

impl<'a> StackCommandBuilder<'a> {
    /// Create a new builder for a registered sequence.
    pub fn new(config: &'a StackingConfig, seq_name: &'a str) -> Self {
        Self { config, seq_name }
    }

    /// Build the complete stack command tokens.
    pub fn build(&self) -> EngineCommand {
        let mut tokens = vec![
            "stack".to_string(),
            format!("{}{}", REGISTERED_PREFIX, self.seq_name),
            "rej".to_string(),
            format_sigma(self.config.sigma_low),
            format_sigma(self.config.sigma_high),
            "-norm=addscale".to_string(),
        ];

        if self.config.normalize_output {
            tokens.push("-output_norm".to_string());
        }
        if self.config.rgb_equalize {
            tokens.push("-rgb_equal".to_string());
        }

        tokens.push(format!("-out=../{}_stacked", self.seq_name));
        EngineCommand::new(tokens)
    }
}

/// Deterministic sigma rendering.
///
/// Integral values keep one decimal (`3.0`), fractional values render
/// minimally (`2.5`).
pub fn format_sigma(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_command_with_defaults() {
        let config = StackingConfig::default();
        let command = StackCommandBuilder::new(&config, "m42").build();
        assert_eq!(
            command.to_string(),
            "stack r_m42 rej 3.0 3.0 -norm=addscale -output_norm -rgb_equal -out=../m42_stacked"
        );
    }

    #[test]
    fn optional_flags_are_independent() {
        let mut config = StackingConfig::default();
        config.normalize_output = false;
        let command = StackCommandBuilder::new(&config, "m42").build();
        assert!(!command.to_string().contains("-output_norm"));
        assert!(command.to_string().contains("-rgb_equal"));

        config.normalize_output = true;
        config.rgb_equalize = false;
        let command = StackCommandBuilder::new(&config, "m42").build();
        assert!(command.to_string().contains("-output_norm"));
        assert!(!command.to_string().contains("-rgb_equal"));
    }

    #[test]
    fn sigma_thresholds_keep_order_low_then_high() {
        let config = StackingConfig {
            sigma_low: 2.5,
            sigma_high: 4.0,
            normalize_output: false,
            rgb_equalize: false,
        };
        let command = StackCommandBuilder::new(&config, "seq").build();
        assert_eq!(
            command.to_string(),
            "stack r_seq rej 2.5 4.0 -norm=addscale -out=../seq_stacked"
        );
    }

    #[test]
    fn sigma_formatting_is_deterministic() {
        assert_eq!(format_sigma(3.0), "3.0");
        assert_eq!(format_sigma(2.5), "2.5");
        assert_eq!(format_sigma(10.0), "10.0");
        assert_eq!(format_sigma(1.75), "1.75");
    }

    #[test]
    fn register_targets_unregistered_sequence() {
        assert_eq!(register_command("m42").to_string(), "register m42");
    }

    #[test]
    fn artifact_lands_in_working_directory() {
        assert_eq!(
            stacked_artifact(Path::new("/data/target"), "m42"),
            PathBuf::from("/data/target/m42_stacked.fit")
        );
    }
}
