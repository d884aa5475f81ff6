//! CLI module for driftscope.
//!
//! This module provides the command-line interface for ingesting plans and
//! reporting drift.

mod commands;
mod output;

pub use commands::{Cli, Commands, FilterArg, GroupBy, OutputFormat, PlansCommands};
pub use output::OutputFormatter;
