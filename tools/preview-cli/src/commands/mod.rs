//! CLI command implementations.

pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod sync;

use clap::{Args, Subcommand};
use serde_json::Value;

/// A `field=value` pair given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub value: Value,
}

/// Parse `field=value`. The value is read as JSON when it parses, and as a
/// plain string otherwise.
pub fn parse_assignment(s: &str) -> Result<Assignment, String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", s))?;
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(Assignment {
        field: field.to_string(),
        value,
    })
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Theme to preview.
        #[arg(short, long, default_value = "twentytwenty")]
        theme: String,

        /// Overwrite an existing config without asking.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the bootstrap command.
#[derive(Args)]
pub struct BootstrapArgs {
    /// Print the pane blob (with the REST schema) instead of the preview blob.
    #[arg(long)]
    pub pane: bool,

    /// Dirty value to seed, as field=value. May be repeated.
    #[arg(long = "dirty", value_parser = parse_assignment)]
    pub dirty: Vec<Assignment>,
}

/// Arguments for the dispatch command.
#[derive(Args)]
pub struct DispatchArgs {
    /// Route to request (e.g., /wp/v2/pages/4).
    pub route: String,

    /// Request the edit context explicitly.
    #[arg(long)]
    pub edit: bool,

    /// Dispatch as if no preview session were active.
    #[arg(long)]
    pub no_preview: bool,
}

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// Edit to apply, as field=value. May be repeated.
    #[arg(long = "edit", value_parser = parse_assignment, required = true)]
    pub edits: Vec<Assignment>,

    /// Override the debounce window.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Commit the edits once the preview has settled.
    #[arg(long)]
    pub commit: bool,
}
