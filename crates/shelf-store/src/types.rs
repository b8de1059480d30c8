//! Domain records for users and sessions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Length of the sliding validity window of a session (14 days).
pub const SESSION_WINDOW_SECS: i64 = 14 * 24 * 60 * 60;

/// The sliding validity window as a `TimeDelta`.
pub fn session_window() -> TimeDelta {
    TimeDelta::seconds(SESSION_WINDOW_SECS)
}

/// Access role of a user. Assigned at creation, never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "product:view")]
    ProductView,
    #[serde(rename = "product:edit")]
    ProductEdit,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProductView => "product:view",
            Role::ProductEdit => "product:edit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "product:view" => Ok(Role::ProductView),
            "product:edit" => Ok(Role::ProductEdit),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// A user that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Conjunctive lookup filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn by_role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    /// The id when the filter is keyed on the id alone.
    pub fn id_only(&self) -> Option<i64> {
        match (self.id, &self.username, self.role) {
            (Some(id), None, None) => Some(id),
            _ => None,
        }
    }

    /// Whether `user` satisfies every set field.
    pub fn matches(&self, user: &User) -> bool {
        self.id.is_none_or(|id| user.id == id)
            && self
                .username
                .as_deref()
                .is_none_or(|name| user.username == name)
            && self.role.is_none_or(|role| user.role == role)
    }
}

/// A server-side login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub last_accessed_time: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, user_id: i64, last_accessed_time: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            last_accessed_time,
        }
    }

    /// Instant at which the session stops being valid unless touched again.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_accessed_time + session_window()
    }

    /// Valid while `now - last_accessed_time` is strictly below the window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_accessed_time) < session_window()
    }
}
