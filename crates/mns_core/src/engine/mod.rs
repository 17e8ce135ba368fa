//! External image-processing engine interface.
//!
//! The core never performs pixel arithmetic itself; all calibration,
//! registration, debayering, and stacking math is delegated to an external
//! Siril-compatible engine through discrete, synchronous commands.
//! [`EngineSession`] is the seam: production code uses the process-backed
//! [`SirilProcess`], tests use a scripted double.

mod command;
mod siril;

pub use command::EngineCommand;
pub use siril::SirilProcess;

use std::io;

use thiserror::Error;

/// Errors from the engine transport or a rejected command.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine executable could not be started.
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The transport broke while a command was in flight.
    #[error("engine pipe error during '{command}': {source}")]
    Pipe {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The engine reported a failure for a command.
    #[error("engine command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// The session was closed and cannot accept further commands.
    #[error("engine session is closed")]
    SessionClosed,
}

impl EngineError {
    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a pipe error with command context.
    pub fn pipe(command: impl Into<String>, source: io::Error) -> Self {
        Self::Pipe {
            command: command.into(),
            source,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A command-accepting engine session.
///
/// Commands are issued strictly one at a time; `run` blocks until the engine
/// reports an outcome for the command. Implementations are driven from a
/// single workflow thread, so no internal synchronization is required.
pub trait EngineSession: Send {
    /// Execute one command, blocking until the engine reports an outcome.
    fn run(&mut self, command: &EngineCommand) -> EngineResult<()>;

    /// Terminate the session. Further `run` calls fail with `SessionClosed`.
    fn close(&mut self) -> EngineResult<()>;
}
