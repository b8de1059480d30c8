//! Server configuration.

use std::net::SocketAddr;

use shelf_cache::CacheConfig;
use shelf_config::{DEFAULT_ALLOW_LIST, ShelfConfig};

use crate::auth::AllowList;
use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Methods callable without a session. Fixed for the life of the process.
    pub allow_list: AllowList,

    /// Lookup cache settings for the store.
    pub cache: CacheConfig,

    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            allow_list: AllowList::new(DEFAULT_ALLOW_LIST.iter().copied()),
            cache: CacheConfig::default(),
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// Build from a loaded configuration file.
    pub fn from_config(config: &ShelfConfig) -> Result<Self> {
        let bind_address = config.server.bind.parse().map_err(|e| {
            ServerError::Config(format!(
                "invalid bind address '{}': {}",
                config.server.bind, e
            ))
        })?;

        Ok(Self {
            bind_address,
            allow_list: AllowList::new(config.auth.allow_list.iter().cloned()),
            cache: CacheConfig::default()
                .with_ttl(config.cache.ttl())
                .with_max_items(config.cache.max_items),
            request_logging: config.server.request_logging,
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Replace the allow-list.
    pub fn with_allow_list<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = AllowList::new(methods);
        self
    }

    /// Set the lookup cache settings.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}
