//! Preview CLI - Command line tool for REST resource live preview.
//!
//! Commands:
//! - `preview config` - Manage configuration
//! - `preview bootstrap` - Print the preview or pane bootstrap blob
//! - `preview dispatch` - Dispatch a route through the elevating dispatcher
//! - `preview sync` - Run a synchronizer over a set of edits

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use preview_observability::{init_logging, LogFormat, LogLevel, LoggingConfig};

use commands::{BootstrapArgs, ConfigArgs, DispatchArgs, SyncArgs};

/// Preview CLI - Inspect and drive REST resource previews
#[derive(Parser)]
#[command(name = "preview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Print the bootstrap blob for the preview or the pane
    Bootstrap(BootstrapArgs),

    /// Dispatch a single route
    Dispatch(DispatchArgs),

    /// Apply edits and wait for the preview to refresh
    Sync(SyncArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::new(
        if cli.verbose { LogLevel::Debug } else { LogLevel::Warn },
        if cli.json { LogFormat::Json } else { LogFormat::Human },
    );
    init_logging(&logging)?;

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Bootstrap(args) => commands::bootstrap::run(args, &ctx).await,
        Commands::Dispatch(args) => commands::dispatch::run(args, &ctx).await,
        Commands::Sync(args) => commands::sync::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
