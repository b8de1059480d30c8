//! Application state shared across handlers.

use std::sync::Arc;

use shelf_store::Store;
use tokio::sync::Mutex;

use crate::auth::{AuthInterceptor, SessionIssuer};
use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-fronted user and session store.
    pub store: Store,

    /// Per-call authentication gate.
    pub interceptor: Arc<AuthInterceptor>,

    /// Sign-in session factory.
    pub issuer: Arc<SessionIssuer>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Held from the first-user check to the insert, so only one
    /// registration can ever see an empty user table.
    pub registration: Arc<Mutex<()>>,
}

impl AppState {
    /// Create a new application state. The allow-list is taken from `config`.
    pub fn new(store: Store, config: ServerConfig) -> Self {
        let interceptor = AuthInterceptor::new(store.clone(), config.allow_list.clone());
        let issuer = SessionIssuer::new(store.clone());
        Self {
            store,
            interceptor: Arc::new(interceptor),
            issuer: Arc::new(issuer),
            config: Arc::new(config),
            registration: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the session issuer.
    pub fn with_issuer(mut self, issuer: SessionIssuer) -> Self {
        self.issuer = Arc::new(issuer);
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
