//! User service endpoints.
//!
//! RPC-style unary calls: every method is a POST to its fully-qualified name,
//! which is also what the allow-list and the auth middleware match on.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{NewUser, Role, User, UserFilter};
use tracing::info;

use crate::auth::{AuthenticatedIdentity, password};
use crate::error::ServerError;
use crate::state::AppState;

pub const CREATE_USER: &str = "/api.v1.UserService/CreateUser";
pub const CREATE_SESSION: &str = "/api.v1.UserService/CreateSession";
pub const GET_CURRENT_USER: &str = "/api.v1.UserService/GetCurrentUser";
pub const LIST_USERS: &str = "/api.v1.UserService/ListUsers";
pub const DELETE_SESSION: &str = "/api.v1.UserService/DeleteSession";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for CreateUser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

/// Request body for CreateSession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub username: String,
    pub password: String,
}

/// A user as returned by the API. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// Response for CreateSession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub user: UserInfo,
    pub last_accessed_at: DateTime<Utc>,
}

/// Response for ListUsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserInfo>,
    pub total: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api.v1.UserService/CreateUser
///
/// The first user ever created becomes `admin`; everyone after that starts
/// as `product:view`.
pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserInfo>, ServerError> {
    let username = request.username.trim().to_string();
    if username.is_empty() || request.password.is_empty() {
        return Err(ServerError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let password_hash = hash_in_background(request.password).await?;

    let user = {
        let _registration = state.registration.lock().await;
        let role = match state.store.get_user(&UserFilter::default()).await? {
            None => Role::Admin,
            Some(_) => Role::ProductView,
        };
        state
            .store
            .create_user(NewUser {
                username,
                password_hash,
                role,
            })
            .await?
    };

    info!(user_id = user.id, role = %user.role, "User registered");
    Ok(Json(user.into()))
}

/// POST /api.v1.UserService/CreateSession
///
/// Verifies credentials, issues a session and sets the `user_session` cookie.
pub async fn create_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Response, ServerError> {
    let user = state
        .store
        .get_user(&UserFilter::by_username(request.username.trim()))
        .await?
        .ok_or_else(|| ServerError::NotFound("user not found".to_string()))?;

    if !verify_in_background(request.password, user.password_hash.clone()).await? {
        return Err(ServerError::Unauthenticated(
            "username and password do not match".to_string(),
        ));
    }

    let issued = state.issuer.issue(&user, origin(&headers)).await?;

    let body = CreateSessionResponse {
        last_accessed_at: issued.session.last_accessed_time,
        user: user.into(),
    };
    Ok(([(header::SET_COOKIE, issued.cookie)], Json(body)).into_response())
}

/// POST /api.v1.UserService/GetCurrentUser
pub async fn get_current_user_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<Json<UserInfo>, ServerError> {
    let user = current_user(&state, &identity).await?;
    Ok(Json(user.into()))
}

/// POST /api.v1.UserService/ListUsers - admin only.
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<Json<ListUsersResponse>, ServerError> {
    let caller = current_user(&state, &identity).await?;
    if caller.role != Role::Admin {
        return Err(ServerError::PermissionDenied(format!(
            "role '{}' cannot list users",
            caller.role
        )));
    }

    let users: Vec<UserInfo> = state
        .store
        .list_users(&UserFilter::default())
        .await?
        .into_iter()
        .map(UserInfo::from)
        .collect();
    let total = users.len();

    Ok(Json(ListUsersResponse { users, total }))
}

/// POST /api.v1.UserService/DeleteSession
///
/// Ends the caller's own session and clears the cookie.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    state
        .store
        .delete_session(identity.user_id, &identity.session_id)
        .await?;

    let cookie = state
        .issuer
        .clear_cookie(origin(&headers))
        .map_err(|e| ServerError::Internal(format!("failed to build cookie: {}", e)))?;

    info!(user_id = identity.user_id, "Session ended");
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
}

async fn current_user(state: &AppState, identity: &AuthenticatedIdentity) -> Result<User, ServerError> {
    state
        .store
        .get_user(&UserFilter::by_id(identity.user_id))
        .await?
        .ok_or_else(|| ServerError::NotFound("user not found".to_string()))
}

// Argon2 runs on the blocking pool.
async fn hash_in_background(password: String) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| ServerError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(ServerError::from)
}

async fn verify_in_background(password: String, hash: String) -> Result<bool, ServerError> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("verification task failed: {}", e)))?
        .map_err(ServerError::from)
}
