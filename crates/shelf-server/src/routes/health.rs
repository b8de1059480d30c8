//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use shelf_cache::CacheStats;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Lookup cache occupancy.
    pub cache: CacheHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealth {
    pub users: CacheOccupancy,
    pub sessions: CacheOccupancy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheOccupancy {
    pub items: usize,
    pub max_items: usize,
    pub over_capacity: bool,
}

impl From<CacheStats> for CacheOccupancy {
    fn from(stats: CacheStats) -> Self {
        Self {
            items: stats.items,
            max_items: stats.max_items,
            over_capacity: stats.over_capacity,
        }
    }
}

/// Liveness probe (no auth required).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheHealth {
            users: state.store.user_cache_stats().into(),
            sessions: state.store.session_cache_stats().into(),
        },
    })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
