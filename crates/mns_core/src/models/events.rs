//! Typed events emitted by a workflow run.
//!
//! The core holds no reference to any UI object; every observable effect of a
//! run - log lines, progress, the terminal outcome - is an event pushed
//! through an [`EventSink`] that any listener can consume.

use std::path::PathBuf;
use std::sync::Arc;

use crate::logging::LogLevel;

/// Terminal outcome of one run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run reached `Complete`.
    Success {
        /// Path of the final stacked artifact.
        artifact: PathBuf,
        /// Number of sets that went through calibration.
        sets_processed: usize,
        /// Total frames linked into the combined sequence.
        frames_combined: usize,
    },
    /// The run reached `Failed` with the first error encountered.
    Failure {
        message: String,
    },
}

/// One event in the stream produced by a workflow run.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A log line with severity.
    Log { level: LogLevel, message: String },
    /// Overall progress, 0-100, monotonic non-decreasing within a run.
    Progress { percent: u32 },
    /// The run finished; exactly one per run.
    Finished { outcome: RunOutcome },
}

/// Fan-out point for workflow events.
///
/// Cloning is cheap; every clone feeds the same listener.
#[derive(Clone, Default)]
pub struct EventSink {
    callback: Option<Arc<dyn Fn(&WorkflowEvent) + Send + Sync>>,
}

impl EventSink {
    /// Sink delivering every event to `callback`.
    pub fn new(callback: impl Fn(&WorkflowEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Sink that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Deliver one event.
    pub fn emit(&self, event: &WorkflowEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Deliver a log event.
    pub fn log(&self, level: LogLevel, message: &str) {
        self.emit(&WorkflowEvent::Log {
            level,
            message: message.to_string(),
        });
    }

    /// Deliver a progress event.
    pub fn progress(&self, percent: u32) {
        self.emit(&WorkflowEvent::Progress { percent });
    }

    /// Deliver the terminal event.
    pub fn finished(&self, outcome: RunOutcome) {
        self.emit(&WorkflowEvent::Finished { outcome });
    }
}
