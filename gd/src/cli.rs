//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GoalDaemon - hierarchical goal planning and execution daemon
#[derive(Parser)]
#[command(
    name = "gd",
    about = "Hierarchical goal planning and execution daemon",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Run,

    /// Plan and execute a single request, then exit
    Plan {
        /// The request to plan
        request: String,
    },

    /// List stored patterns
    Patterns,
}
