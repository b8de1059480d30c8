//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shelf_store::StoreError;
use thiserror::Error;

use crate::auth::{AuthError, IssueError, password::PasswordError};

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or invalid session.
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but not allowed to call this method.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found. The message is returned to the caller as is.
    #[error("{0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database/storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(what) => ServerError::AlreadyExists(what),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => ServerError::Unauthenticated(e.to_string()),
            AuthError::Lookup(_) | AuthError::Refresh(_) => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<IssueError> for ServerError {
    fn from(e: IssueError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

impl From<PasswordError> for ServerError {
    fn from(e: PasswordError) -> Self {
        ServerError::Internal(format!("Password hashing failed: {}", e))
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ServerError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        // Internal details stay in the log.
        let message = if status.is_server_error() {
            "internal error".to_string()
        } else {
            message
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthenticated_message_is_generic() {
        let (status, body) = render(AuthError::Unauthenticated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
        assert_eq!(body["message"], "authentication required");
    }

    #[tokio::test]
    async fn test_auth_persistence_failure_is_internal() {
        let err: ServerError = AuthError::Refresh(StoreError::Backend("disk full".into())).into();
        assert!(matches!(err, ServerError::Internal(_)));

        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal error");
    }

    #[tokio::test]
    async fn test_store_error_mapping() {
        let err: ServerError = StoreError::AlreadyExists("alice".into()).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_exists");

        let err: ServerError = StoreError::Backend("disk".into()).into();
        assert!(matches!(err, ServerError::Storage(_)));

        let (status, body) = render(ServerError::NotFound("user not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "user not found");
    }
}
