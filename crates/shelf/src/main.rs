//! Shelf - product catalogue backend
//!
//! Main entry point for the Shelf CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Shelf - product catalogue backend
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (overrides SHELF_CONFIG and ./shelf.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for rotated JSON log files
    #[arg(long, global = true, env = "SHELF_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Shelf server
    Start(start::StartArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + daily-rotated JSON file
    let filter = if cli.verbose {
        "shelf=debug,shelf_server=debug,shelf_store=debug,shelf_cache=debug,shelf_config=debug,tower_http=debug,info"
    } else {
        "shelf=info,shelf_server=info,shelf_store=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "shelf.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "shelf=trace,shelf_server=trace,shelf_store=trace,shelf_cache=trace,shelf_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
