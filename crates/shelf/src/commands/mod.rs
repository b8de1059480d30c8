//! CLI command handlers.

pub mod config;
pub mod start;

use anyhow::Result;
use shelf_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file from `--config`.
    pub config_path: Option<std::path::PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and load the configuration for this invocation.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = shelf_config::load_config(self.config_path.as_deref())?;
        Ok(loaded)
    }
}
