//! Multi-Night Stacker console front-end.
//!
//! Thin caller around `mns_core`: resolves the run configuration from
//! settings, an optional preset file, and command-line flags, spawns the
//! background run, and prints its log/progress/terminal events.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mns_core::config::{ConfigManager, ConfigSection, Preset};
use mns_core::engine::SirilProcess;
use mns_core::logging::LogLevel;
use mns_core::models::{RunOutcome, WorkflowEvent};
use mns_core::orchestrator::{spawn_run, RunRequest};
use mns_core::sets::normalize_working_dir;

#[derive(Parser, Debug)]
#[command(
    name = "mns",
    version,
    about = "Automated multi-night stacking through a Siril-compatible engine"
)]
struct Cli {
    /// Working directory containing set1/, set2/, ...
    #[arg(default_value = ".")]
    working_dir: PathBuf,

    /// Name for the combined sequence (default: today's date, YYYYMMDD_seq)
    #[arg(short, long)]
    seq_name: Option<String>,

    /// Preset file (JSON) supplying calibration and stacking settings
    #[arg(short, long)]
    preset: Option<PathBuf>,

    /// Synthetic bias coefficient (multiplier for the OFFSET metadata value)
    #[arg(long)]
    bias_coefficient: Option<f64>,

    /// Skip flat-field correction
    #[arg(long)]
    no_flats: bool,

    /// Skip debayering (mono camera)
    #[arg(long)]
    no_debayer: bool,

    /// Low sigma rejection threshold
    #[arg(long)]
    sigma_low: Option<f64>,

    /// High sigma rejection threshold
    #[arg(long)]
    sigma_high: Option<f64>,

    /// Skip output histogram normalization
    #[arg(long)]
    no_output_norm: bool,

    /// Skip RGB channel equalization
    #[arg(long)]
    no_rgb_equal: bool,

    /// Engine executable
    #[arg(long, default_value = SirilProcess::DEFAULT_PROGRAM)]
    engine: String,

    /// Settings file (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut manager = ConfigManager::new(&config_path);
    manager
        .load_or_create()
        .with_context(|| format!("loading settings from {}", config_path.display()))?;

    // Resolution order: settings defaults, then preset, then explicit flags.
    let defaults = manager.settings().defaults.clone();
    let mut calibration = defaults.calibration();
    let mut stacking = defaults.stacking();
    let mut seq_name = None;

    if let Some(path) = &cli.preset {
        let preset = Preset::load(path)
            .with_context(|| format!("loading preset from {}", path.display()))?;
        calibration = preset.calibration();
        stacking = preset.stacking();
        seq_name = Some(preset.sequence_name);
    }

    if let Some(value) = cli.bias_coefficient {
        calibration.bias_coefficient = value;
    }
    if cli.no_flats {
        calibration.use_flats = false;
    }
    if cli.no_debayer {
        calibration.debayer = false;
    }
    if let Some(value) = cli.sigma_low {
        stacking.sigma_low = value;
    }
    if let Some(value) = cli.sigma_high {
        stacking.sigma_high = value;
    }
    if cli.no_output_norm {
        stacking.normalize_output = false;
    }
    if cli.no_rgb_equal {
        stacking.rgb_equalize = false;
    }

    let seq_name = cli
        .seq_name
        .or(seq_name)
        .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d_seq").to_string());

    let canonical = cli
        .working_dir
        .canonicalize()
        .with_context(|| format!("resolving {}", cli.working_dir.display()))?;
    let working_dir = normalize_working_dir(&canonical);
    if working_dir != canonical {
        eprintln!(
            "Detected subdirectory, using parent: {}",
            working_dir.display()
        );
    }

    let engine = SirilProcess::spawn(&cli.engine)?;

    let request = RunRequest {
        working_dir: working_dir.clone(),
        seq_name,
        calibration: calibration.clone(),
        stacking,
        log_dir: PathBuf::from(&manager.settings().paths.logs_folder),
        log_config: manager.settings().logging.log_config(),
    };

    let handle = spawn_run(engine, request).context("starting workflow run")?;

    for event in handle.events() {
        match event {
            WorkflowEvent::Log { level, message } => {
                if level >= LogLevel::Warn {
                    eprintln!("{}", message);
                } else {
                    println!("{}", message);
                }
            }
            WorkflowEvent::Progress { percent } => {
                println!("[{:>3}%]", percent);
            }
            WorkflowEvent::Finished { outcome } => {
                if let RunOutcome::Success {
                    artifact,
                    sets_processed,
                    frames_combined,
                } = outcome
                {
                    println!(
                        "Stacked {} frames from {} sets -> {}",
                        frames_combined,
                        sets_processed,
                        artifact.display()
                    );
                }
            }
        }
    }

    let result = handle.wait();

    // Remember the last working directory and bias coefficient, as the
    // original tool does on close.
    let settings = manager.settings_mut();
    settings.paths.last_directory = working_dir.display().to_string();
    settings.defaults.bias_coefficient = calibration.bias_coefficient;
    manager.update_section(ConfigSection::Paths)?;
    manager.update_section(ConfigSection::Defaults)?;

    result?;
    Ok(())
}

fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "multi-night-stacker")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("multi_night_stacker.toml"))
}
