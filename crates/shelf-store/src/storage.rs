//! Storage abstraction for users and sessions.
//!
//! ```text
//! Driver (trait)        - persistence operations used by the store
//!     └── SqliteDriver  - default SQLite implementation
//!     └── MockDriver    - in-memory mock for testing, with failure injection
//! ```
//!
//! Drivers hold no application logic: role assignment, caching and
//! fetch-after-write live in [`Store`](crate::Store).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::{NewUser, Session, User, UserFilter};
use crate::{Result, StoreError};

/// Persistence operations for users and sessions.
///
/// Calls may block on I/O. Dropping the returned future abandons the call,
/// which is how a caller's cancellation reaches the backend.
#[async_trait]
pub trait Driver: Send + Sync {
    // ── User Operations ─────────────────────────────────────────────────

    /// Insert a user and return it with its assigned id.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// List users matching `filter`, ordered by id.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// First user matching `filter`, if any.
    async fn get_user(&self, filter: &UserFilter) -> Result<Option<User>>;

    // ── Session Operations ──────────────────────────────────────────────

    /// Insert a session row.
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// All sessions owned by `user_id`.
    async fn get_user_sessions(&self, user_id: i64) -> Result<Vec<Session>>;

    /// Move the sliding window of `session_id` forward to `at`.
    async fn update_last_accessed_time(&self, session_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete a session row. Deleting a missing row is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

/// Driver operation, used by [`MockDriver`] for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateUser,
    ListUsers,
    GetUser,
    CreateSession,
    GetUserSessions,
    UpdateLastAccessedTime,
    DeleteSession,
}

/// In-memory driver for tests.
#[derive(Debug, Default)]
pub struct MockDriver {
    users: Mutex<Vec<User>>,
    sessions: Mutex<Vec<Session>>,
    failing: Mutex<HashSet<Operation>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl MockDriver {
    /// Create a new empty mock driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` fail with [`StoreError::Backend`].
    pub fn fail_on(&self, op: Operation) {
        self.failing.lock().insert(op);
    }

    /// Undo [`fail_on`](Self::fail_on).
    pub fn recover(&self, op: Operation) {
        self.failing.lock().remove(&op);
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of one session row.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .lock()
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
    }

    /// Insert a session row directly, bypassing call accounting.
    pub fn seed_session(&self, session: Session) {
        self.sessions.lock().push(session);
    }

    fn enter(&self, op: Operation) -> Result<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.failing.lock().contains(&op) {
            return Err(StoreError::Backend(format!("{op:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.enter(Operation::CreateUser)?;

        let mut users = self.users.lock();
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::AlreadyExists(user.username));
        }

        let user = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.enter(Operation::ListUsers)?;
        Ok(self
            .users
            .lock()
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }

    async fn get_user(&self, filter: &UserFilter) -> Result<Option<User>> {
        self.enter(Operation::GetUser)?;
        Ok(self.users.lock().iter().find(|u| filter.matches(u)).cloned())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.enter(Operation::CreateSession)?;

        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| s.session_id == session.session_id) {
            return Err(StoreError::AlreadyExists(session.session_id.clone()));
        }
        sessions.push(session.clone());
        Ok(())
    }

    async fn get_user_sessions(&self, user_id: i64) -> Result<Vec<Session>> {
        self.enter(Operation::GetUserSessions)?;
        Ok(self
            .sessions
            .lock()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_last_accessed_time(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.enter(Operation::UpdateLastAccessedTime)?;
        if let Some(s) = self
            .sessions
            .lock()
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            s.last_accessed_time = at;
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.enter(Operation::DeleteSession)?;
        self.sessions.lock().retain(|s| s.session_id != session_id);
        Ok(())
    }
}
