//! Command-line interface for tune-forge.
//!
//! Provides commands for score schema generation, dataset export and run updates.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
