//! Command-line interface for gearctl.
//!
//! Provides the autoscale, status, dump and load commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
