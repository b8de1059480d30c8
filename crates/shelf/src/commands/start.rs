//! Start command - launches the Shelf server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use shelf_server::{Server, ServerConfig};
use shelf_store::{SqliteDriver, Store};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values and `SHELF_*` variables.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Address to bind to, host:port (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    pub database: Option<PathBuf>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    // ── Load configuration ──────────────────────────────────────────────

    let loaded = ctx.load_config()?;
    let mut config = loaded.config;

    match &loaded.source {
        Some(path) => info!(path = %path.display(), "Loaded config"),
        None => info!("No config file found, using defaults"),
    }
    for var in &loaded.overrides {
        info!(var, "Config value overridden from environment");
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    let server_config = ServerConfig::from_config(&config)?;

    // ── Persistence ─────────────────────────────────────────────────────

    let db_path = &config.database.path;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    let driver = SqliteDriver::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let store = Store::new(Arc::new(driver), server_config.cache.clone());

    if ctx.verbose {
        eprintln!("database:     {}", db_path.display());
        eprintln!("environment:  {}", config.server.environment);
        eprintln!("allow-listed: {}", server_config.allow_list.len());
    }

    // ── Serve ───────────────────────────────────────────────────────────

    info!(
        bind = %server_config.bind_address,
        environment = %config.server.environment,
        "Starting Shelf"
    );
    Server::new(store, server_config).run().await?;

    Ok(())
}
