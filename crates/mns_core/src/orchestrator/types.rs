//! Core types for the workflow orchestrator.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logging::RunLogger;
use crate::models::{CalibrationConfig, EventSink, StackingConfig};

/// Strictly ordered states of one workflow run.
///
/// There is no skipping and no parallelism; `Failed` is reachable from any
/// non-terminal state on the first unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    DirectorySet,
    /// Calibrating the set at this position in the set list (0-based).
    PerSetCalibration(usize),
    Combining,
    Registering,
    Stacking,
    Complete,
    Failed,
}

/// Calibration status tracked per set for the duration of a run.
///
/// The filesystem is only the discovery signal; during the run this is the
/// source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    Pending,
    Calibrated,
    Failed,
}

/// Read-only context for one run.
///
/// The orchestrator exclusively owns the working directory handle and the
/// configs for the duration of the run; no concurrent run may share them.
pub struct RunContext {
    /// Root directory containing the set folders.
    pub working_dir: PathBuf,
    /// Name for the combined sequence.
    pub seq_name: String,
    /// Calibration parameters, immutable during the run.
    pub calibration: CalibrationConfig,
    /// Stacking parameters, immutable during the run.
    pub stacking: StackingConfig,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
    /// Event stream consumed by the caller.
    pub events: EventSink,
}

impl RunContext {
    /// Create a new run context.
    pub fn new(
        working_dir: PathBuf,
        seq_name: impl Into<String>,
        calibration: CalibrationConfig,
        stacking: StackingConfig,
        logger: Arc<RunLogger>,
        events: EventSink,
    ) -> Self {
        Self {
            working_dir,
            seq_name: seq_name.into(),
            calibration,
            stacking,
            logger,
            events,
        }
    }
}

/// Mutable state accumulated during a run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Current workflow state.
    pub state: WorkflowState,
    /// Per-set calibration status, indexed like the set list.
    pub set_status: Vec<SetStatus>,
    /// Total frames linked into the combined sequence.
    pub frames_combined: usize,
    /// Last reported progress percentage (monotonicity clamp).
    pub last_percent: u32,
}

/// Summary returned when a run reaches `Complete`.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Path of the final stacked artifact.
    pub artifact: PathBuf,
    /// Number of sets that went through calibration.
    pub sets_processed: usize,
    /// Total frames linked into the combined sequence.
    pub frames_combined: usize,
}

/// Handle for cancelling a running workflow.
///
/// Cancellation is honored at stage boundaries and before each set's
/// calibration; an in-flight engine command is never preempted.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
