//! CLI interface for Mind2Code
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mind2Code requirement-to-code orchestrator
///
/// Turns a natural-language requirement into a saved source file, asking
/// for confirmation when the model is unsure or proposes an improvement.
#[derive(Parser, Debug)]
#[command(name = "mind2code")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn a requirement into code
    Run {
        /// The requirement text
        requirement: String,

        /// File with repository metadata to steer language and naming
        #[arg(long, value_name = "FILE")]
        repo_context: Option<PathBuf>,

        /// File with the user's cognitive profile
        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// Session id (a new one is generated when omitted)
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Show provider availability
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration as TOML
    Show,

    /// Print the configuration file path
    Path,
}
