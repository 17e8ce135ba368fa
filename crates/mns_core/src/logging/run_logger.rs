//! Per-run logger with file and event output.
//!
//! Each run gets its own logger that:
//! - Writes to a dedicated log file
//! - Forwards every line as a typed log event to the run's event sink
//! - Supports compact mode with progress-line filtering
//! - Maintains a tail buffer of engine output for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix};
use crate::models::EventSink;

/// Per-run logger with dual output (file + event stream).
pub struct RunLogger {
    /// Run name for identification.
    run_name: String,
    /// Path to log file.
    log_path: PathBuf,
    /// File writer (buffered).
    file_writer: Mutex<Option<BufWriter<File>>>,
    /// Event sink receiving each line as a typed log event.
    sink: EventSink,
    /// Logging configuration.
    config: LogConfig,
    /// Tail buffer of recent engine output lines.
    tail_buffer: Mutex<VecDeque<String>>,
    /// Last progress value logged (for compact mode filtering).
    last_progress: Mutex<u32>,
}

impl RunLogger {
    /// Create a new run logger.
    ///
    /// # Arguments
    /// * `run_name` - Name of the run (used in the log filename)
    /// * `log_dir` - Directory to write the log file to
    /// * `config` - Logging configuration
    /// * `sink` - Event sink for the run
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: EventSink,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&run_name)));
        let file = File::create(&log_path)?;

        Ok(Self {
            run_name,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            sink,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(100)),
            last_progress: Mutex::new(0),
        })
    }

    /// Get the run name.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        self.write_file(message);
        self.sink.log(level, message);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an engine command being issued.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a progress line (filtered in compact mode).
    ///
    /// Returns true if the line was logged, false if filtered. This only
    /// affects the textual log; progress events are emitted separately by
    /// the orchestrator.
    pub fn progress_line(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            let current_step = (percent / step) * step;
            let last_step = (*last / step) * step;

            if current_step <= last_step && percent < 100 {
                return false;
            }
            *last = percent;
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record one line of engine output.
    ///
    /// In compact mode lines only enter the tail buffer; otherwise they are
    /// logged at debug level as well.
    pub fn engine_output(&self, line: &str) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        if !self.config.compact {
            self.log(LogLevel::Debug, line);
        }
    }

    /// Show the tail buffer (typically after an engine failure).
    pub fn show_tail(&self) {
        let lines: Vec<String> = {
            let buffer = self.tail_buffer.lock();
            buffer.iter().cloned().collect()
        };
        if lines.is_empty() {
            return;
        }

        self.log(LogLevel::Info, "--- engine output tail ---");
        for line in &lines {
            self.log(LogLevel::Info, line);
        }
        self.log(LogLevel::Info, "--------------------------");
    }

    /// Get the current tail buffer contents.
    pub fn tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Write a line to the log file, timestamped when configured.
    fn write_file(&self, message: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            if self.config.show_timestamps {
                let timestamp = Local::now().format("%H:%M:%S");
                let _ = writeln!(writer, "[{}] {}", timestamp, message);
            } else {
                let _ = writeln!(writer, "{}", message);
            }
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowEvent;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger =
            RunLogger::new("test_run", dir.path(), LogConfig::default(), EventSink::disabled())
                .unwrap();

        assert!(logger.log_path().exists());
        assert!(logger.log_path().to_string_lossy().contains("test_run.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger =
            RunLogger::new("test_run", dir.path(), LogConfig::default(), EventSink::disabled())
                .unwrap();

        logger.info("Test message");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("Test message"));
    }

    #[test]
    fn forwards_log_events() {
        let dir = tempdir().unwrap();
        let seen: Arc<PlMutex<Vec<WorkflowEvent>>> = Arc::new(PlMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = EventSink::new(move |event| seen_clone.lock().push(event.clone()));

        let logger = RunLogger::new("test_run", dir.path(), LogConfig::default(), sink).unwrap();
        logger.warn("careful");
        logger.info("ok");

        let events = seen.lock();
        assert_eq!(events.len(), 2);
        match &events[0] {
            WorkflowEvent::Log { level, message } => {
                assert_eq!(*level, LogLevel::Warn);
                assert!(message.contains("[WARNING] careful"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn compact_mode_filters_progress_lines() {
        let dir = tempdir().unwrap();
        let mut config = LogConfig::default();
        config.compact = true;
        config.progress_step = 20;

        let logger =
            RunLogger::new("test_run", dir.path(), config, EventSink::disabled()).unwrap();

        assert!(!logger.progress_line(5));
        assert!(!logger.progress_line(15));
        assert!(logger.progress_line(20));
        assert!(!logger.progress_line(25));
        assert!(logger.progress_line(40));
        assert!(logger.progress_line(100));
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let dir = tempdir().unwrap();
        let mut config = LogConfig::default();
        config.error_tail = 5;

        let logger =
            RunLogger::new("test_run", dir.path(), config, EventSink::disabled()).unwrap();

        for i in 0..10 {
            logger.engine_output(&format!("Line {}", i));
        }

        let tail = logger.tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
