//! HTTP API server and session authentication for Shelf.
//!
//! This crate exposes the user service over HTTP and owns the session
//! authentication path: the cookie token codec, the per-call auth
//! interceptor and the session issuer.
//!
//! # Features
//!
//! - RPC-style user service (`POST /api.v1.UserService/<Method>`)
//! - Cookie sessions with a sliding 14-day window
//! - Allow-list of methods reachable without a session
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shelf_server::{Server, ServerConfig};
//! use shelf_store::{SqliteDriver, Store};
//!
//! let config = ServerConfig::default().with_bind_address("127.0.0.1:8080".parse()?);
//! let driver = SqliteDriver::open("shelf.db".as_ref())?;
//! let store = Store::new(Arc::new(driver), config.cache.clone());
//!
//! Server::new(store, config).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use auth::{
    AllowList, AuthError, AuthInterceptor, AuthenticatedIdentity, CallMetadata, SessionIssuer,
    auth_middleware,
};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use logging::request_logging_middleware;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use shelf_store::Store;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The Shelf HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server over `store` with the given configuration.
    pub fn new(store: Store, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(store, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health is outside the auth layer
            .merge(routes::health_routes())
            .merge(self.user_service_routes())
            // Request logging (inner layer)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// User service methods, all behind the auth interceptor.
    ///
    /// Allow-listed methods pass through it without a session.
    fn user_service_routes(&self) -> Router<AppState> {
        use axum::routing::post;

        Router::new()
            .route(routes::CREATE_USER, post(routes::create_user_handler))
            .route(routes::CREATE_SESSION, post(routes::create_session_handler))
            .route(
                routes::GET_CURRENT_USER,
                post(routes::get_current_user_handler),
            )
            .route(routes::LIST_USERS, post(routes::list_users_handler))
            .route(routes::DELETE_SESSION, post(routes::delete_session_handler))
            // Only matched methods are gated; unknown paths still 404
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run until SIGINT or SIGTERM, letting in-flight calls finish.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.serve(addr, shutdown_signal()).await
    }

    /// Run on a specific address with no shutdown trigger (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.serve(addr, std::future::pending()).await
    }

    /// Run on `addr` until `shutdown` resolves.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("cannot bind {addr}: {e}")))?;

        info!(
            addr = %listener.local_addr().unwrap_or(addr),
            allow_listed = self.state.config.allow_list.len(),
            "Serving user service"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("serve loop ended: {e}")))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    /// Shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
