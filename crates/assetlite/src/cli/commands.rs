//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::permission::ADMINISTRATOR;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on, overriding `server.bind_address`
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding an array of documents, each with a `doctype` key
    pub file: PathBuf,
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// List the available reports
    List,

    /// Run a report and print its rows
    Run {
        /// Report title or slug (e.g. `mtbf`)
        name: String,

        /// Report filter as `key=value`; repeatable
        #[arg(short, long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Permission resolver commands.
#[derive(Debug, Subcommand)]
pub enum PermissionsCommand {
    /// Show the list filters a user gets for an entity type
    Filters {
        /// Target entity type (e.g. `Asset`)
        doctype: String,

        /// User to resolve for
        #[arg(short, long, default_value = ADMINISTRATOR)]
        user: String,
    },

    /// Check whether a user may see one document
    Check {
        /// Entity type
        doctype: String,

        /// Document name
        name: String,

        /// User to check
        #[arg(short, long, default_value = ADMINISTRATOR)]
        user: String,
    },

    /// Show the configured permission mappings
    Mappings,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Configuration file to validate (defaults to the standard path)
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// JSON output
    Json,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
