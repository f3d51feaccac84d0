//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - plan: plan one team
//! - plan-all: plan every team in the snapshot in parallel
//! - teams: list teams and members
//! - validate: load and check a snapshot

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::OutputFormat;

/// Teamplan - capacity-constrained delivery planning
#[derive(Parser, Debug)]
#[command(name = "teamplan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot file, overriding the configured path
    #[arg(short, long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan a single team
    Plan {
        /// Team id to plan
        #[arg(short, long)]
        team: String,

        /// Planning date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format, overriding the configured one
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Plan every team in the snapshot
    PlanAll {
        /// Planning date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format, overriding the configured one
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// List teams and their members
    Teams,

    /// Load and validate the snapshot
    Validate,
}
