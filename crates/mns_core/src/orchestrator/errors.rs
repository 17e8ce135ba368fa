//! Error types for the workflow orchestrator.
//!
//! Warnings (missing flats, missing master flat, zero-frame sets) are log
//! events, not errors; everything here is fatal to the run.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;

/// Top-level workflow error with stage context.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A stage failed during execution.
    #[error("workflow failed at stage '{stage}': {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    /// Discovery produced no usable sets; the run cannot start.
    #[error("no valid sets found under {workdir} (expected set1/lights, set2/lights, ...)")]
    NoValidSets { workdir: String },

    /// Configuration validation failed before any command was issued.
    #[error("invalid run configuration: {message}")]
    ValidationFailed { message: String },

    /// The run was cancelled at a stage boundary.
    #[error("run cancelled before stage '{stage}'")]
    Cancelled { stage: &'static str },

    /// Run setup failed (directories, logger).
    #[error("run setup failed: {message}")]
    Setup { message: String },
}

impl WorkflowError {
    /// Create a stage failed error.
    pub fn stage_failed(stage: &'static str, source: StageError) -> Self {
        Self::StageFailed { stage, source }
    }

    /// Create a no-valid-sets error.
    pub fn no_valid_sets(workdir: impl Into<String>) -> Self {
        Self::NoValidSets {
            workdir: workdir.into(),
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(stage: &'static str) -> Self {
        Self::Cancelled { stage }
    }

    /// Create a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }
}

/// Error from a single workflow stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// An engine command failed; the run aborts with no retry.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// File I/O error with operation context.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A directory the stage depends on does not exist.
    #[error("required directory not found: {path}")]
    MissingDirectory { path: String },

    /// Generic stage error with message.
    #[error("{0}")]
    Other(String),
}

impl StageError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a missing directory error.
    pub fn missing_directory(path: impl Into<String>) -> Self {
        Self::MissingDirectory { path: path.into() }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_displays_context() {
        let err = StageError::io(
            "creating combined folder",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("creating combined folder"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn workflow_error_chains_context() {
        let stage_err = StageError::from(EngineError::command_failed("register seq", "no frames"));
        let err = WorkflowError::stage_failed("registration", stage_err);

        let msg = err.to_string();
        assert!(msg.contains("registration"));
        assert!(msg.contains("register seq"));
    }
}
