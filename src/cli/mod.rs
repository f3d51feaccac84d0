//! CLI module for teamplan - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for planning one or all
//! teams, listing teams and validating a snapshot.

pub mod commands;

pub use commands::Cli;
