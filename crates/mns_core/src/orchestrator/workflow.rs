//! The multi-night workflow driver.
//!
//! Drives the stages in strict order for a discovered set list:
//! discovery and setup, per-set calibration, combination, registration,
//! stacking. Progress is reported as a monotonic percentage, the first
//! unrecoverable error aborts the remaining stages, and partially produced
//! files are left in place on failure.

use std::fs;

use super::errors::{StageError, StageResult, WorkflowError, WorkflowResult};
use super::types::{CancelHandle, RunContext, RunReport, RunState, SetStatus, WorkflowState};
use crate::calibration::calibrate_set;
use crate::combine::{link_combined, COMBINED_DIR};
use crate::engine::{EngineCommand, EngineSession};
use crate::models::RunOutcome;
use crate::sets::discover_sets;
use crate::stacking::{register_command, stacked_artifact, StackCommandBuilder};

/// Progress reached after discovery and setup.
const PROGRESS_SETUP: u32 = 5;
/// Progress span apportioned across per-set calibration.
const PROGRESS_CALIBRATION_SPAN: u32 = 60;
/// Progress reached after combination.
const PROGRESS_COMBINED: u32 = 70;
/// Progress reached after registration.
const PROGRESS_REGISTERED: u32 = 85;

/// One multi-night workflow run over an engine session.
pub struct Workflow<E: EngineSession> {
    engine: E,
    ctx: RunContext,
    state: RunState,
    cancel: CancelHandle,
}

impl<E: EngineSession> Workflow<E> {
    /// Create a workflow for one run.
    pub fn new(engine: E, ctx: RunContext) -> Self {
        Self {
            engine,
            ctx,
            state: RunState::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Get a handle for cancelling this run at the next boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current workflow state.
    pub fn state(&self) -> WorkflowState {
        self.state.state
    }

    /// Run to completion.
    ///
    /// Emits the terminal event on both success and failure; on failure the
    /// triggering error is also logged and partially produced files are left
    /// in place.
    pub fn execute(mut self) -> WorkflowResult<RunReport> {
        let result = self.run_stages();

        match &result {
            Ok(report) => {
                self.transition(WorkflowState::Complete);
                self.ctx.events.finished(RunOutcome::Success {
                    artifact: report.artifact.clone(),
                    sets_processed: report.sets_processed,
                    frames_combined: report.frames_combined,
                });
            }
            Err(err) => {
                self.transition(WorkflowState::Failed);
                self.ctx.logger.error(&err.to_string());
                self.ctx.logger.show_tail();
                self.ctx.events.finished(RunOutcome::Failure {
                    message: err.to_string(),
                });
            }
        }

        result
    }

    fn run_stages(&mut self) -> WorkflowResult<RunReport> {
        self.ctx
            .calibration
            .validate()
            .map_err(WorkflowError::validation_failed)?;
        self.ctx
            .stacking
            .validate()
            .map_err(WorkflowError::validation_failed)?;
        if self.ctx.seq_name.trim().is_empty() {
            return Err(WorkflowError::validation_failed(
                "sequence name must not be empty",
            ));
        }

        self.ctx.logger.phase("Starting Multi-Night Processing");
        self.transition(WorkflowState::DirectorySet);

        let sets = discover_sets(&self.ctx.working_dir, &self.ctx.logger);
        if sets.is_empty() {
            return Err(WorkflowError::no_valid_sets(
                self.ctx.working_dir.display().to_string(),
            ));
        }
        self.ctx.logger.info(&format!(
            "Detected sets: {} ({} total)",
            sets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "),
            sets.len()
        ));
        self.state.set_status = vec![SetStatus::Pending; sets.len()];

        // The engine session starts in the working directory; the combined
        // output folder must exist before any set is processed.
        let workdir = self.ctx.working_dir.clone();
        self.run_command("setup", &EngineCommand::cd(&workdir))?;
        let combined_dir = workdir.join(COMBINED_DIR);
        fs::create_dir_all(&combined_dir).map_err(|e| {
            WorkflowError::stage_failed("setup", StageError::io("creating combined folder", e))
        })?;
        self.ctx
            .logger
            .info(&format!("Created directory: {}", combined_dir.display()));
        self.report_progress(PROGRESS_SETUP);

        // Per-set calibration, strictly in set order. All sets must complete
        // before combination; the first failure aborts the run.
        let per_set = PROGRESS_CALIBRATION_SPAN / sets.len() as u32;
        for (i, set) in sets.iter().enumerate() {
            self.check_cancelled("calibration")?;
            self.transition(WorkflowState::PerSetCalibration(i));
            self.ctx.logger.phase(&format!("Processing {}", set.name));

            match calibrate_set(
                &mut self.engine,
                &workdir,
                set,
                &self.ctx.calibration,
                &self.ctx.logger,
            ) {
                Ok(()) => self.state.set_status[i] = SetStatus::Calibrated,
                Err(e) => {
                    self.state.set_status[i] = SetStatus::Failed;
                    return Err(WorkflowError::stage_failed("calibration", e));
                }
            }
            self.report_progress(PROGRESS_SETUP + (i as u32 + 1) * per_set);
        }
        debug_assert!(self
            .state
            .set_status
            .iter()
            .all(|s| *s == SetStatus::Calibrated));

        self.check_cancelled("combination")?;
        self.transition(WorkflowState::Combining);
        self.ctx.logger.phase("Combining All Nights");
        let frames = link_combined(&workdir, &sets, &self.ctx.seq_name, &self.ctx.logger)
            .map_err(|e| WorkflowError::stage_failed("combination", e))?;
        self.state.frames_combined = frames;
        self.ctx
            .logger
            .success(&format!("Created {} links", frames));
        self.report_progress(PROGRESS_COMBINED);

        self.check_cancelled("registration")?;
        self.transition(WorkflowState::Registering);
        self.ctx.logger.phase("Registering Across All Nights");
        self.run_command("registration", &EngineCommand::cd(&combined_dir))?;
        let register = register_command(&self.ctx.seq_name);
        self.run_command("registration", &register)?;
        self.run_command("registration", &EngineCommand::cd(&workdir))?;
        self.report_progress(PROGRESS_REGISTERED);

        self.check_cancelled("stacking")?;
        self.transition(WorkflowState::Stacking);
        self.ctx.logger.phase("Stacking Final Result");
        self.run_command("stacking", &EngineCommand::cd(&combined_dir))?;
        let stack = StackCommandBuilder::new(&self.ctx.stacking, &self.ctx.seq_name).build();
        self.run_command("stacking", &stack)?;
        self.run_command("stacking", &EngineCommand::cd(&workdir))?;
        self.report_progress(100);

        let artifact = stacked_artifact(&workdir, &self.ctx.seq_name);
        self.ctx.logger.phase("Processing Complete");
        self.ctx
            .logger
            .success(&format!("Final result: {}", artifact.display()));

        self.ctx.logger.command("close");
        if let Err(e) = self.engine.close() {
            self.ctx.logger.warn(&format!("Engine close failed: {}", e));
        }

        Ok(RunReport {
            artifact,
            sets_processed: sets.len(),
            frames_combined: frames,
        })
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::debug!("workflow state {:?} -> {:?}", self.state.state, next);
        self.state.state = next;
    }

    fn check_cancelled(&self, stage: &'static str) -> WorkflowResult<()> {
        if self.cancel.is_cancelled() {
            self.ctx
                .logger
                .warn(&format!("Run cancelled before {}", stage));
            return Err(WorkflowError::cancelled(stage));
        }
        Ok(())
    }

    /// Report progress, clamped monotonic non-decreasing.
    fn report_progress(&mut self, percent: u32) {
        let clamped = percent.min(100).max(self.state.last_percent);
        self.state.last_percent = clamped;
        self.ctx.logger.progress_line(clamped);
        self.ctx.events.progress(clamped);
    }

    fn issue(&mut self, command: &EngineCommand) -> StageResult<()> {
        self.ctx.logger.command(&command.to_string());
        self.engine.run(command).map_err(StageError::from)
    }

    fn run_command(
        &mut self,
        stage: &'static str,
        command: &EngineCommand,
    ) -> WorkflowResult<()> {
        self.issue(command)
            .map_err(|e| WorkflowError::stage_failed(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::logging::{LogConfig, RunLogger};
    use crate::models::{CalibrationConfig, EventSink, StackingConfig, WorkflowEvent};
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        events: Arc<Mutex<Vec<WorkflowEvent>>>,
        sink: EventSink,
    }

    impl Fixture {
        fn new() -> Self {
            let events: Arc<Mutex<Vec<WorkflowEvent>>> = Arc::new(Mutex::new(Vec::new()));
            let events_clone = Arc::clone(&events);
            let sink = EventSink::new(move |event| events_clone.lock().push(event.clone()));
            Self {
                dir: tempdir().unwrap(),
                events,
                sink,
            }
        }

        fn workdir(&self) -> PathBuf {
            self.dir.path().to_path_buf()
        }

        fn add_set(&self, index: u32, lights: usize, calibrated: usize) {
            let set_dir = self.workdir().join(format!("set{}", index));
            std::fs::create_dir_all(set_dir.join("lights")).unwrap();
            for i in 0..lights {
                std::fs::write(
                    set_dir.join("lights").join(format!("light_{:03}.fit", i + 1)),
                    b"raw",
                )
                .unwrap();
            }
            // The scripted engine produces nothing, so calibrated outputs are
            // staged up front.
            std::fs::create_dir_all(set_dir.join("process")).unwrap();
            for i in 0..calibrated {
                std::fs::write(
                    set_dir
                        .join("process")
                        .join(format!("pp_light_{:05}.fit", i + 1)),
                    b"cal",
                )
                .unwrap();
            }
        }

        fn context(&self, seq_name: &str) -> RunContext {
            let logger = Arc::new(
                RunLogger::new(
                    seq_name,
                    self.workdir().join(".logs"),
                    LogConfig::default(),
                    self.sink.clone(),
                )
                .unwrap(),
            );
            RunContext::new(
                self.workdir(),
                seq_name,
                CalibrationConfig::default(),
                StackingConfig::default(),
                logger,
                self.sink.clone(),
            )
        }

        fn progress_values(&self) -> Vec<u32> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    WorkflowEvent::Progress { percent } => Some(*percent),
                    _ => None,
                })
                .collect()
        }

        fn outcome(&self) -> Option<RunOutcome> {
            self.events.lock().iter().rev().find_map(|e| match e {
                WorkflowEvent::Finished { outcome } => Some(outcome.clone()),
                _ => None,
            })
        }
    }

    #[test]
    fn two_set_run_reaches_complete() {
        let fx = Fixture::new();
        fx.add_set(1, 3, 3);
        fx.add_set(2, 2, 2);

        let engine = ScriptedEngine::new();
        let recorder = engine.recorder();
        let workflow = Workflow::new(engine, fx.context("m42"));
        let report = workflow.execute().unwrap();

        assert_eq!(report.sets_processed, 2);
        assert_eq!(report.frames_combined, 5);
        assert_eq!(report.artifact, fx.workdir().join("m42_stacked.fit"));

        // Progress is monotonic and ends at 100.
        let progress = fx.progress_values();
        assert_eq!(progress, vec![5, 35, 65, 70, 85, 100]);
        assert!(matches!(fx.outcome(), Some(RunOutcome::Success { .. })));

        // Command issuance order matches the stage order.
        let commands = recorder.lock().clone();
        let register_pos = commands.iter().position(|c| c == "register m42").unwrap();
        let stack_pos = commands.iter().position(|c| c.starts_with("stack r_m42")).unwrap();
        let last_calibrate = commands
            .iter()
            .rposition(|c| c.starts_with("calibrate light"))
            .unwrap();
        assert!(last_calibrate < register_pos);
        assert!(register_pos < stack_pos);
        assert_eq!(commands.last().unwrap(), "close");
    }

    #[test]
    fn set_without_lights_is_skipped_and_run_proceeds() {
        let fx = Fixture::new();
        fx.add_set(1, 3, 3);
        // set2 exists but has no lights folder.
        std::fs::create_dir_all(fx.workdir().join("set2")).unwrap();

        let workflow = Workflow::new(ScriptedEngine::new(), fx.context("m42"));
        let report = workflow.execute().unwrap();

        assert_eq!(report.sets_processed, 1);
        assert_eq!(report.frames_combined, 3);
        assert_eq!(*fx.progress_values().last().unwrap(), 100);
    }

    #[test]
    fn empty_working_directory_cannot_start() {
        let fx = Fixture::new();

        let workflow = Workflow::new(ScriptedEngine::new(), fx.context("m42"));
        let err = workflow.execute().unwrap_err();

        assert!(matches!(err, WorkflowError::NoValidSets { .. }));
        assert!(matches!(fx.outcome(), Some(RunOutcome::Failure { .. })));
    }

    #[test]
    fn engine_failure_aborts_run_with_first_error() {
        let fx = Fixture::new();
        fx.add_set(1, 2, 2);

        let engine = ScriptedEngine::failing_on("register");
        let workflow = Workflow::new(engine, fx.context("m42"));
        let err = workflow.execute().unwrap_err();

        match &err {
            WorkflowError::StageFailed { stage, .. } => assert_eq!(*stage, "registration"),
            other => panic!("unexpected error {:?}", other),
        }
        match fx.outcome() {
            Some(RunOutcome::Failure { message }) => {
                assert!(message.contains("registration"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // The run never progressed past registration.
        assert!(fx.progress_values().iter().all(|p| *p <= 70));
    }

    #[test]
    fn calibration_failure_prevents_combination() {
        let fx = Fixture::new();
        fx.add_set(1, 2, 2);
        fx.add_set(2, 2, 2);

        let engine = ScriptedEngine::failing_on("calibrate light");
        let recorder = engine.recorder();
        let workflow = Workflow::new(engine, fx.context("m42"));
        let err = workflow.execute().unwrap_err();

        assert!(matches!(err, WorkflowError::StageFailed { stage: "calibration", .. }));
        // No combination output: the combined folder stays empty.
        let combined: Vec<_> = std::fs::read_dir(fx.workdir().join(COMBINED_DIR))
            .unwrap()
            .collect();
        assert!(combined.is_empty());
        // set2 was never touched.
        let commands = recorder.lock().clone();
        assert!(!commands.iter().any(|c| c.contains("set2")));
    }

    #[test]
    fn cancellation_stops_before_first_set() {
        let fx = Fixture::new();
        fx.add_set(1, 2, 2);

        let workflow = Workflow::new(ScriptedEngine::new(), fx.context("m42"));
        workflow.cancel_handle().cancel();
        let err = workflow.execute().unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { stage: "calibration" }));
    }

    #[test]
    fn invalid_config_fails_before_any_command() {
        let fx = Fixture::new();
        fx.add_set(1, 1, 1);

        let engine = ScriptedEngine::new();
        let recorder = engine.recorder();
        let mut ctx = fx.context("m42");
        ctx.stacking.sigma_low = -1.0;
        let workflow = Workflow::new(engine, ctx);
        let err = workflow.execute().unwrap_err();

        assert!(matches!(err, WorkflowError::ValidationFailed { .. }));
        assert!(recorder.lock().is_empty());
    }
}
