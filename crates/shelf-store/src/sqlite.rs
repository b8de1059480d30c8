use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use tracing::debug;

use crate::storage::Driver;
use crate::types::{NewUser, Role, Session, User, UserFilter};
use crate::{Result, StoreError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Thin repository over SQLite for users and sessions.
///
/// Statements run on the blocking thread pool against a single
/// mutex-guarded connection.
#[derive(Clone)]
pub struct SqliteDriver {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDriver {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::migrate(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::migrate(conn)
    }

    fn migrate(mut conn: Connection) -> Result<Self> {
        let report = embedded::migrations::runner()
            .run(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        debug!(
            applied = report.applied_migrations().len(),
            "Database migrations complete"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
                params![user.username, user.password_hash, user.role.as_str()],
            );

            match inserted {
                Ok(_) => Ok(User {
                    id: conn.last_insert_rowid(),
                    username: user.username,
                    password_hash: user.password_hash,
                    role: user.role,
                }),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::AlreadyExists(user.username))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (clause, values) = where_clause(&filter);
            let mut stmt = conn.prepare(&format!(
                "SELECT id, username, password_hash, role FROM users WHERE {clause} ORDER BY id"
            ))?;
            let iter = stmt.query_map(params_from_iter(values.iter()), row_to_user)?;

            let mut users = Vec::new();
            for r in iter {
                users.push(r?);
            }
            Ok(users)
        })
        .await
    }

    async fn get_user(&self, filter: &UserFilter) -> Result<Option<User>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (clause, values) = where_clause(&filter);
            let mut stmt = conn.prepare(&format!(
                "SELECT id, username, password_hash, role FROM users WHERE {clause} ORDER BY id LIMIT 1"
            ))?;
            let mut rows = stmt.query_map(params_from_iter(values.iter()), row_to_user)?;
            Ok(rows.next().transpose()?)
        })
        .await
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, user_id, last_accessed_time) VALUES (?1, ?2, ?3)",
                params![
                    session.session_id,
                    session.user_id,
                    session.last_accessed_time.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user_sessions(&self, user_id: i64) -> Result<Vec<Session>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, user_id, last_accessed_time FROM sessions WHERE user_id = ?1",
            )?;
            let iter = stmt.query_map(params![user_id], row_to_session)?;

            let mut sessions = Vec::new();
            for r in iter {
                sessions.push(r?);
            }
            Ok(sessions)
        })
        .await
    }

    async fn update_last_accessed_time(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_accessed_time = ?1 WHERE session_id = ?2",
                params![at.to_rfc3339(), session_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn where_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    let mut conditions = vec!["1 = 1".to_string()];
    let mut values = Vec::new();

    if let Some(id) = filter.id {
        values.push(Value::Integer(id));
        conditions.push(format!("id = ?{}", values.len()));
    }
    if let Some(username) = &filter.username {
        values.push(Value::Text(username.clone()));
        conditions.push(format!("username = ?{}", values.len()));
    }
    if let Some(role) = filter.role {
        values.push(Value::Text(role.as_str().to_string()));
        conditions.push(format!("role = ?{}", values.len()));
    }

    (conditions.join(" AND "), values)
}

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: role
            .parse::<Role>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        last_accessed_time: parse_dt(2, &row.get::<_, String>(2)?)?,
    })
}
