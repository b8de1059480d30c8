//! Per-call authentication gate.
//!
//! Every inbound call passes through [`AuthInterceptor::intercept`]:
//!
//! ```text
//! allow-listed? ──yes──────────────────────────────────────► handler(None)
//!      │no
//!      ▼
//! extract cookie → decode token → user lookup → session lookup → expiry
//!      │ any miss: Unauthenticated (handler not called)
//!      ▼
//! refresh last-accessed time ──err──► Internal (handler not called)
//!      │ok
//!      ▼
//! handler(Some(identity))
//! ```

use std::collections::HashSet;
use std::future::Future;

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shelf_store::{Store, StoreError, UserFilter};
use thiserror::Error;
use tracing::debug;

use super::token;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "user_session";

/// Metadata key the gRPC gateway forwards browser cookies under.
pub const GATEWAY_COOKIE_KEY: &str = "grpcgateway-cookie";

/// Plain cookie metadata key.
pub const COOKIE_KEY: &str = "cookie";

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Caller identity established by a valid session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub user_id: i64,
    pub session_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Error
// ─────────────────────────────────────────────────────────────────────────────

/// Why a call was not let through.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or bad credentials. The message never says which check failed.
    #[error("authentication required")]
    Unauthenticated,

    /// User or session lookup failed in persistence.
    #[error("session lookup failed: {0}")]
    Lookup(#[source] StoreError),

    /// The last-accessed time could not be refreshed.
    #[error("failed to refresh session: {0}")]
    Refresh(#[source] StoreError),
}

fn reject(reason: &'static str) -> AuthError {
    debug!(reason, "Rejecting unauthenticated call");
    AuthError::Unauthenticated
}

// ─────────────────────────────────────────────────────────────────────────────
// Allow-list
// ─────────────────────────────────────────────────────────────────────────────

/// Fully-qualified method names that skip authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    methods: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, case-insensitive key/value entries attached to a call.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    entries: Vec<(String, String)>,
}

impl CallMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Keys are stored lowercased.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .push((key.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Values stored under `key`, in arrival order.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).next()
    }

    /// Build from HTTP headers. Values that are not visible ASCII are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut metadata = Self::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                metadata.insert(name.as_str(), value);
            }
        }
        metadata
    }
}

/// Find the `user_session` cookie value.
///
/// Gateway-forwarded entries are scanned before plain `cookie` entries, each
/// in arrival order, and pairs within an entry left to right. First match wins.
pub fn extract_session_cookie(metadata: &CallMetadata) -> Option<&str> {
    [GATEWAY_COOKIE_KEY, COOKIE_KEY]
        .into_iter()
        .flat_map(|key| metadata.get_all(key))
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

// ─────────────────────────────────────────────────────────────────────────────
// Interceptor
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether a call may reach its handler.
#[derive(Clone)]
pub struct AuthInterceptor {
    store: Store,
    allow_list: AllowList,
}

impl AuthInterceptor {
    pub fn new(store: Store, allow_list: AllowList) -> Self {
        Self { store, allow_list }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Run `next` if the call is allow-listed or carries a valid session.
    ///
    /// Allow-listed methods are dispatched with no identity even when a valid
    /// cookie is present. Otherwise the session's last-accessed time is
    /// refreshed before `next` runs, and `next` is never called on failure.
    pub async fn intercept<Req, Resp, E, F, Fut>(
        &self,
        metadata: &CallMetadata,
        method: &str,
        request: Req,
        next: F,
    ) -> Result<Resp, E>
    where
        F: FnOnce(Option<AuthenticatedIdentity>, Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
        E: From<AuthError>,
    {
        if self.allow_list.contains(method) {
            debug!(method, "Allow-listed method, skipping authentication");
            return next(None, request).await;
        }

        let identity = self.authenticate(metadata).await?;
        debug!(method, user_id = identity.user_id, "Call authenticated");
        next(Some(identity), request).await
    }

    /// Validate the session cookie in `metadata` and slide its window forward.
    pub async fn authenticate(
        &self,
        metadata: &CallMetadata,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let cookie = extract_session_cookie(metadata).ok_or_else(|| reject("no session cookie"))?;
        let (user_id, session_id) =
            token::decode(cookie).map_err(|_| reject("malformed session token"))?;

        let user = self
            .store
            .get_user(&UserFilter::by_id(user_id))
            .await
            .map_err(AuthError::Lookup)?
            .ok_or_else(|| reject("unknown user"))?;

        let sessions = self
            .store
            .get_user_sessions(user.id)
            .await
            .map_err(AuthError::Lookup)?;

        let now = Utc::now();
        let session = sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| reject("unknown session"))?;
        if !session.is_valid_at(now) {
            return Err(reject("session expired"));
        }

        self.store
            .update_last_accessed_time(user.id, &session_id, now)
            .await
            .map_err(AuthError::Refresh)?;

        Ok(AuthenticatedIdentity {
            user_id,
            session_id,
        })
    }
}
