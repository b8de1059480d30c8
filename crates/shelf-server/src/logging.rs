//! Per-call logging for the user service.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level};

use crate::state::AppState;

/// RPC method name for a `/<service>/<Method>` path, or the path itself.
fn rpc_method(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => method,
        _ => path,
    }
}

fn level_for(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Run the call inside a `call` span and log its outcome.
///
/// Disabled by `request_logging = false`; the span is skipped too.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let span = tracing::info_span!("call", method = rpc_method(&path), path = %path);
    let started = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let _entered = span.enter();
    match level_for(response.status()) {
        Level::ERROR => tracing::error!(status, elapsed_ms, "Call failed"),
        Level::WARN => tracing::warn!(status, elapsed_ms, "Call rejected"),
        _ => tracing::info!(status, elapsed_ms, "Call completed"),
    }

    response
}
