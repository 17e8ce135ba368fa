//! Background runner: one workflow run per dedicated thread.
//!
//! The run itself is fully sequential (no parallel stages, no parallel
//! per-set calibration); the calling thread stays responsive and consumes
//! log/progress/terminal notifications from a channel. A handle drives
//! exactly one run - single-run exclusivity over the working directory and
//! the engine session is the caller's contract.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::errors::{WorkflowError, WorkflowResult};
use super::types::{CancelHandle, RunContext, RunReport};
use super::workflow::Workflow;
use crate::engine::EngineSession;
use crate::logging::{LogConfig, RunLogger};
use crate::models::{CalibrationConfig, EventSink, StackingConfig, WorkflowEvent};

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Root directory containing the set folders.
    pub working_dir: PathBuf,
    /// Name for the combined sequence.
    pub seq_name: String,
    /// Calibration parameters.
    pub calibration: CalibrationConfig,
    /// Stacking parameters.
    pub stacking: StackingConfig,
    /// Directory for the run's log file.
    pub log_dir: PathBuf,
    /// Logging configuration.
    pub log_config: LogConfig,
}

/// Handle to an in-flight run.
pub struct RunHandle {
    events: Receiver<WorkflowEvent>,
    cancel: CancelHandle,
    join: Option<JoinHandle<WorkflowResult<RunReport>>>,
}

impl RunHandle {
    /// The run's event stream.
    ///
    /// Iteration ends once the run thread has finished and the terminal
    /// event has been delivered.
    pub fn events(&self) -> &Receiver<WorkflowEvent> {
        &self.events
    }

    /// Request cancellation at the next stage or set boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the run finishes and return its result.
    pub fn wait(mut self) -> WorkflowResult<RunReport> {
        match self.join.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(WorkflowError::setup("run thread panicked"))),
            None => Err(WorkflowError::setup("run already waited on")),
        }
    }
}

/// Spawn one workflow run on a dedicated background thread.
pub fn spawn_run<E>(engine: E, request: RunRequest) -> io::Result<RunHandle>
where
    E: EngineSession + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let sink = EventSink::new(move |event: &WorkflowEvent| {
        let _ = tx.send(event.clone());
    });

    let logger = Arc::new(RunLogger::new(
        &request.seq_name,
        &request.log_dir,
        request.log_config.clone(),
        sink.clone(),
    )?);

    let ctx = RunContext::new(
        request.working_dir,
        request.seq_name,
        request.calibration,
        request.stacking,
        logger,
        sink,
    );

    let workflow = Workflow::new(engine, ctx);
    let cancel = workflow.cancel_handle();

    let join = thread::Builder::new()
        .name("mns-workflow".to_string())
        .spawn(move || workflow.execute())?;

    Ok(RunHandle {
        events: rx,
        cancel,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::models::RunOutcome;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn background_run_delivers_events_and_result() {
        let dir = tempdir().unwrap();
        let set_dir = dir.path().join("set1");
        fs::create_dir_all(set_dir.join("lights")).unwrap();
        fs::create_dir_all(set_dir.join("process")).unwrap();
        for i in 0..2 {
            fs::write(
                set_dir.join("process").join(format!("pp_light_{:05}.fit", i + 1)),
                b"cal",
            )
            .unwrap();
        }

        let request = RunRequest {
            working_dir: dir.path().to_path_buf(),
            seq_name: "m42".to_string(),
            calibration: CalibrationConfig::default(),
            stacking: StackingConfig::default(),
            log_dir: dir.path().join(".logs"),
            log_config: LogConfig::default(),
        };

        let handle = spawn_run(ScriptedEngine::new(), request).unwrap();

        let mut saw_progress = false;
        let mut outcome = None;
        for event in handle.events() {
            match event {
                WorkflowEvent::Progress { .. } => saw_progress = true,
                WorkflowEvent::Finished { outcome: o } => outcome = Some(o),
                WorkflowEvent::Log { .. } => {}
            }
        }

        assert!(saw_progress);
        assert!(matches!(outcome, Some(RunOutcome::Success { .. })));

        let report = handle.wait().unwrap();
        assert_eq!(report.frames_combined, 2);
        assert!(report.artifact.ends_with("m42_stacked.fit"));
    }

    #[test]
    fn cancelled_run_fails_with_cancellation() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("set1/lights")).unwrap();

        let request = RunRequest {
            working_dir: dir.path().to_path_buf(),
            seq_name: "m42".to_string(),
            calibration: CalibrationConfig::default(),
            stacking: StackingConfig::default(),
            log_dir: dir.path().join(".logs"),
            log_config: LogConfig::default(),
        };

        let handle = spawn_run(ScriptedEngine::new(), request).unwrap();
        handle.cancel();

        // The run either finished before the flag was seen or reports
        // cancellation; with a scripted engine both are possible, so only
        // assert the channel terminates and wait() returns.
        for _event in handle.events() {}
        let _ = handle.wait();
    }
}
