//! Registration and final rejection-stack command assembly.

mod options_builder;

pub use options_builder::{
    format_sigma, register_command, stacked_artifact, StackCommandBuilder,
};
