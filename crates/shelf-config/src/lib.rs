//! Configuration system for the Shelf server.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[database]`, `[cache]` and `[auth]` sections, all optional
//! - Config file discovery (`--config` path, `SHELF_CONFIG`, `./shelf.toml`)
//! - Environment variable overrides applied on top of the file
//!
//! The authentication allow-list lives here so it is fixed once at startup.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_ENV, LoadedConfig, PROJECT_CONFIG_FILE, apply_env_overrides, load_config,
    load_config_file,
};
pub use error::{ConfigError, Result};
pub use types::*;
