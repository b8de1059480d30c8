//! Config file discovery and environment overrides.
//!
//! Lookup order, first hit wins:
//! 1. An explicit path (the `--config` flag)
//! 2. The path in `SHELF_CONFIG`
//! 3. `./shelf.toml` in the working directory
//! 4. Built-in defaults
//!
//! An explicit or `SHELF_CONFIG` path that does not exist is an error. A
//! missing `./shelf.toml` is not.
//!
//! Environment overrides are applied on top of whichever source won:
//! `SHELF_BIND`, `SHELF_DATABASE_PATH`, `SHELF_ENVIRONMENT`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::types::ShelfConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SHELF_CONFIG";

/// Config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "shelf.toml";

const BIND_ENV: &str = "SHELF_BIND";
const DATABASE_PATH_ENV: &str = "SHELF_DATABASE_PATH";
const ENVIRONMENT_ENV: &str = "SHELF_ENVIRONMENT";

/// Result of config loading: the config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ShelfConfig,
    /// File the config was read from, `None` when running on defaults.
    pub source: Option<PathBuf>,
    /// Environment variables that overrode file values.
    pub overrides: Vec<&'static str>,
}

/// Discover, load and override the configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with(explicit, Path::new("."), |key| std::env::var(key).ok())
}

/// Load with an injectable working directory and environment lookup.
fn load_config_with<F>(explicit: Option<&Path>, cwd: &Path, env: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, source) = match explicit
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_ENV).map(PathBuf::from))
    {
        Some(path) => (load_config_file(&path)?, Some(path)),
        None => {
            let project = cwd.join(PROJECT_CONFIG_FILE);
            if project.exists() {
                (load_config_file(&project)?, Some(project))
            } else {
                debug!("No config file found, using defaults");
                (ShelfConfig::default(), None)
            }
        }
    };

    let overrides = apply_env_overrides(&mut config, env);
    config.validate()?;

    Ok(LoadedConfig {
        config,
        source,
        overrides,
    })
}

/// Load a single config file.
pub fn load_config_file(path: &Path) -> Result<ShelfConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = ShelfConfig::from_toml(&content)?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply `SHELF_*` overrides. Returns the names of the variables that were set.
pub fn apply_env_overrides<F>(config: &mut ShelfConfig, env: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();

    if let Some(bind) = env(BIND_ENV) {
        config.server.bind = bind;
        applied.push(BIND_ENV);
    }
    if let Some(path) = env(DATABASE_PATH_ENV) {
        config.database.path = PathBuf::from(path);
        applied.push(DATABASE_PATH_ENV);
    }
    if let Some(environment) = env(ENVIRONMENT_ENV) {
        config.server.environment = environment;
        applied.push(ENVIRONMENT_ENV);
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_with(None, dir.path(), env_from(&[])).unwrap();

        assert_eq!(loaded.config, ShelfConfig::default());
        assert!(loaded.source.is_none());
        assert!(loaded.overrides.is_empty());
    }

    #[test]
    fn test_project_file_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[server]\nbind = \"0.0.0.0:7000\"\n",
        )
        .unwrap();

        let loaded = load_config_with(None, dir.path(), env_from(&[])).unwrap();
        assert_eq!(loaded.config.server.bind, "0.0.0.0:7000");
        assert_eq!(
            loaded.source.as_deref(),
            Some(dir.path().join(PROJECT_CONFIG_FILE).as_path())
        );
    }

    #[test]
    fn test_explicit_path_beats_env_and_project() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let from_env = dir.path().join("env.toml");
        std::fs::write(&explicit, "[database]\npath = \"explicit.db\"\n").unwrap();
        std::fs::write(&from_env, "[database]\npath = \"env.db\"\n").unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[database]\npath = \"project.db\"\n",
        )
        .unwrap();

        let env = env_from(&[(CONFIG_ENV, from_env.to_str().unwrap())]);
        let loaded = load_config_with(Some(explicit.as_path()), dir.path(), &env).unwrap();
        assert_eq!(loaded.config.database.path, PathBuf::from("explicit.db"));

        let loaded = load_config_with(None, dir.path(), &env).unwrap();
        assert_eq!(loaded.config.database.path, PathBuf::from("env.db"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = load_config_with(Some(missing.as_path()), dir.path(), env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[server]\nbind = \"127.0.0.1:1\"\nenvironment = \"development\"\n",
        )
        .unwrap();

        let env = env_from(&[
            ("SHELF_BIND", "0.0.0.0:443"),
            ("SHELF_ENVIRONMENT", "production"),
            ("SHELF_DATABASE_PATH", "/var/lib/shelf/shelf.db"),
        ]);
        let loaded = load_config_with(None, dir.path(), env).unwrap();

        assert_eq!(loaded.config.server.bind, "0.0.0.0:443");
        assert!(loaded.config.is_production());
        assert_eq!(
            loaded.config.database.path,
            PathBuf::from("/var/lib/shelf/shelf.db")
        );
        assert_eq!(loaded.overrides.len(), 3);
    }
}
