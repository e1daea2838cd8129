//! Command-line interface for promptstorm.
//!
//! Provides the `run` and `score` commands over a YAML run config.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
