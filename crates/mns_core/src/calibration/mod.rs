//! Per-set flat and light calibration sequencing.
//!
//! Each set is calibrated independently: an optional master flat is built
//! from the set's `flats/` folder, then the lights are converted into the
//! set's `process/` area and calibrated with a synthetic bias derived from
//! the frame OFFSET metadata. Command assembly is pure and testable without
//! an engine; [`calibrate_set`] drives the resulting sequence.

use std::path::Path;

use crate::engine::{EngineCommand, EngineSession};
use crate::logging::RunLogger;
use crate::models::CalibrationConfig;
use crate::orchestrator::{StageError, StageResult};
use crate::sets::SetEntry;

/// Filename of a set's master flat, produced by [`stack_flat_command`].
pub const MASTER_FLAT_FILE: &str = "pp_flat_stacked.fit";

/// Convert raw flat frames into the set's process area.
pub fn convert_flat_command() -> EngineCommand {
    EngineCommand::new(["convert", "flat", "-out=../process"])
}

/// Convert raw light frames into the set's process area.
pub fn convert_light_command() -> EngineCommand {
    EngineCommand::new(["convert", "light", "-out=../process"])
}

/// Calibrate converted flats (bias-only, no dark subtraction).
pub fn calibrate_flat_command() -> EngineCommand {
    EngineCommand::new(["calibrate", "flat"])
}

/// Stack calibrated flats into a master flat.
///
/// Fixed 3/3 sigma bounds and multiplicative normalization; flats are not a
/// user-tunable stack.
pub fn stack_flat_command() -> EngineCommand {
    EngineCommand::new(["stack", "pp_flat", "rej", "3", "3", "-norm=mul"])
}

/// Build the light-calibration command for one set.
///
/// The synthetic bias expression multiplies the configured coefficient
/// (truncated to an integer) against the OFFSET metadata value read by the
/// engine. The master flat is referenced only when the caller verified it
/// exists; the debayer token group is appended as a unit.
pub fn calibrate_light_command(config: &CalibrationConfig, has_master_flat: bool) -> EngineCommand {
    let mut tokens = vec![
        "calibrate".to_string(),
        "light".to_string(),
        format!("-bias=\"={}*$OFFSET\"", config.bias_coefficient as i64),
    ];

    if has_master_flat {
        tokens.push("-flat=pp_flat_stacked".to_string());
    }

    if config.debayer {
        tokens.push("-cfa".to_string());
        tokens.push("-equalize_cfa".to_string());
        tokens.push("-debayer".to_string());
    }

    EngineCommand::new(tokens)
}

/// Calibrate one set end to end.
///
/// Engine failures abort the whole workflow; a missing `flats/` folder or a
/// missing master flat only downgrades the calibration (warning, no flat
/// correction).
pub fn calibrate_set<E: EngineSession>(
    engine: &mut E,
    workdir: &Path,
    set: &SetEntry,
    config: &CalibrationConfig,
    logger: &RunLogger,
) -> StageResult<()> {
    if config.use_flats {
        let flats = set.flats_dir();
        if flats.is_dir() {
            logger.info(&format!("Processing flats for {}...", set.name));
            run(engine, logger, &EngineCommand::cd(&flats))?;
            run(engine, logger, &convert_flat_command())?;
            run(engine, logger, &EngineCommand::cd(Path::new("../process")))?;
            run(engine, logger, &calibrate_flat_command())?;
            run(engine, logger, &stack_flat_command())?;
            run(engine, logger, &EngineCommand::cd(workdir))?;
        } else {
            logger.warn(&format!("No flats folder in {}", set.name));
        }
    }

    logger.info(&format!("Processing lights for {}...", set.name));
    run(engine, logger, &EngineCommand::cd(&set.lights_dir()))?;
    run(engine, logger, &convert_light_command())?;
    run(engine, logger, &EngineCommand::cd(Path::new("../process")))?;

    let has_master_flat = config.use_flats && set.process_dir().join(MASTER_FLAT_FILE).is_file();
    if config.use_flats && !has_master_flat && set.flats_dir().is_dir() {
        logger.warn(&format!(
            "No master flat for {}; calibrating without flat correction",
            set.name
        ));
    }

    run(engine, logger, &calibrate_light_command(config, has_master_flat))?;
    run(engine, logger, &EngineCommand::cd(workdir))?;

    logger.success(&format!("Completed {}", set.name));
    Ok(())
}

fn run<E: EngineSession>(
    engine: &mut E,
    logger: &RunLogger,
    command: &EngineCommand,
) -> StageResult<()> {
    logger.command(&command.to_string());
    engine.run(command).map_err(StageError::from)
}
