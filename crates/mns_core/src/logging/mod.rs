//! Run-scoped logging.
//!
//! Low-level modules log through the `tracing` facade; everything a run's
//! caller should see goes through the [`RunLogger`], which writes a dedicated
//! log file and forwards each line as a typed event.

mod run_logger;
mod types;

pub use run_logger::RunLogger;
pub use types::{LogConfig, LogLevel, MessagePrefix};
