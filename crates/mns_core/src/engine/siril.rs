//! Process-backed Siril engine session.
//!
//! Spawns the engine executable in pipe mode and speaks its line protocol:
//! one command per line on stdin, reply lines on stdout. `log:` lines are
//! engine output, `status: success` / `status: error ...` terminate a
//! command; anything else (`progress:`, `ready`) is ignored.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::{EngineCommand, EngineError, EngineResult, EngineSession};

/// Siril engine driven over a child-process pipe.
pub struct SirilProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    open: bool,
}

impl SirilProcess {
    /// Default engine executable name, resolved through `PATH`.
    pub const DEFAULT_PROGRAM: &'static str = "siril-cli";

    /// Spawn the engine in pipe mode.
    pub fn spawn(program: impl AsRef<Path>) -> EngineResult<Self> {
        Self::spawn_with_args(program, &["-p"])
    }

    /// Spawn the engine executable with explicit arguments.
    pub fn spawn_with_args(program: impl AsRef<Path>, args: &[&str]) -> EngineResult<Self> {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: program.display().to_string(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::pipe("spawn", missing_pipe("stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::pipe("spawn", missing_pipe("stdout")))?;

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            open: true,
        })
    }

    /// Read reply lines until the engine reports an outcome for `command`.
    fn wait_for_status(&mut self, command: &EngineCommand) -> EngineResult<()> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stdout
                .read_line(&mut line)
                .map_err(|e| EngineError::pipe(command.to_string(), e))?;
            if read == 0 {
                return Err(EngineError::command_failed(
                    command.to_string(),
                    "engine closed its output stream",
                ));
            }

            let line = line.trim_end();
            if let Some(status) = line.strip_prefix("status: ") {
                if status.starts_with("success") {
                    return Ok(());
                }
                return Err(EngineError::command_failed(command.to_string(), status));
            }
            if let Some(output) = line.strip_prefix("log: ") {
                tracing::debug!(target: "mns_core::engine", "{}", output);
            }
        }
    }
}

impl EngineSession for SirilProcess {
    fn run(&mut self, command: &EngineCommand) -> EngineResult<()> {
        if !self.open {
            return Err(EngineError::SessionClosed);
        }

        tracing::debug!("engine <- {}", command);
        {
            let stdin = self
                .stdin
                .as_mut()
                .ok_or(EngineError::SessionClosed)?;
            writeln!(stdin, "{}", command)
                .and_then(|_| stdin.flush())
                .map_err(|e| EngineError::pipe(command.to_string(), e))?;
        }

        self.wait_for_status(command)
    }

    fn close(&mut self) -> EngineResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        // Ask the engine to quit, then drop stdin so it sees EOF even if it
        // does not understand `close`.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "close");
            let _ = stdin.flush();
        }
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for SirilProcess {
    fn drop(&mut self) {
        if self.open {
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn missing_pipe(which: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("{} not captured", which))
}
