//! Command-line interface for the `assetlite` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ImportCommand, OutputFormat, PermissionsCommand, ReportCommand, ServeCommand,
    StatusCommand,
};

use crate::logging::Verbosity;

/// assetlite - asset and maintenance management service
///
/// Serves the asset, work order and preventive maintenance API over HTTP and
/// offers offline access to reports and permission checks.
#[derive(Debug, Parser)]
#[command(name = "assetlite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Load fixture documents into the database
    Import(ImportCommand),

    /// List or run reports
    #[command(subcommand)]
    Report(ReportCommand),

    /// Inspect the permission resolver
    #[command(subcommand)]
    Permissions(PermissionsCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
