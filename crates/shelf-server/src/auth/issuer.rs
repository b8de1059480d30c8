//! Session creation and the `user_session` cookie.

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use chrono::{DateTime, Months, Utc};
use shelf_store::{Session, Store, StoreError, User};
use thiserror::Error;
use tracing::{debug, warn};

use super::interceptor::SESSION_COOKIE_NAME;
use super::token;

/// Cookie lifetime seen by the browser. Real expiry is the server-side window.
const COOKIE_LIFETIME_MONTHS: u32 = 100 * 12;

/// IMF-fixdate, as used by the `Expires` attribute.
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Produces new session ids.
pub type SessionIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Hyphen-free UUID v4, so issued tokens always decode.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Sign-in failure after credentials were verified.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("failed to persist session: {0}")]
    Persist(#[source] StoreError),

    /// The session row is already committed when this happens.
    #[error("failed to build session cookie: {0}")]
    Cookie(#[from] InvalidHeaderValue),
}

// ─────────────────────────────────────────────────────────────────────────────
// Cookie
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Descriptor of the `user_session` response cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub value: String,
    pub path: &'static str,
    pub http_only: bool,
    pub expires: DateTime<Utc>,
    pub same_site: SameSite,
    pub secure: bool,
}

impl SessionCookie {
    /// Cookie for a fresh session. Cross-site attributes follow the Origin scheme.
    pub fn new(value: impl Into<String>, now: DateTime<Utc>, origin: Option<&str>) -> Self {
        let expires = now
            .checked_add_months(Months::new(COOKIE_LIFETIME_MONTHS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::with_expiry(value.into(), expires, origin)
    }

    /// Cookie that tells the browser to drop the session token.
    pub fn cleared(origin: Option<&str>) -> Self {
        Self::with_expiry(String::new(), DateTime::<Utc>::default(), origin)
    }

    fn with_expiry(value: String, expires: DateTime<Utc>, origin: Option<&str>) -> Self {
        let https = origin.is_some_and(is_https_origin);
        Self {
            value,
            path: "/",
            http_only: true,
            expires,
            same_site: if https { SameSite::None } else { SameSite::Strict },
            secure: https,
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SESSION_COOKIE_NAME}={}; Path={}",
            self.value, self.path
        )?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        write!(
            f,
            "; Expires={}; SameSite={}",
            self.expires.format(COOKIE_DATE_FORMAT),
            self.same_site.as_str()
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

fn is_https_origin(origin: &str) -> bool {
    origin
        .get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Issuer
// ─────────────────────────────────────────────────────────────────────────────

/// A committed session and the cookie that presents it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub cookie: HeaderValue,
}

/// Creates sessions for users whose credentials have been verified.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Store,
    generate_id: SessionIdGenerator,
}

impl SessionIssuer {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            generate_id: Arc::new(generate_session_id),
        }
    }

    /// Replace the session id generator.
    pub fn with_id_generator<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generate_id = Arc::new(generate);
        self
    }

    /// Persist a new session for `user` and build its cookie.
    ///
    /// The store refetches the user's session list after the insert. Cookie
    /// rendering happens after the commit: if it fails the session row stays
    /// behind with no credential handed to the client.
    pub async fn issue(&self, user: &User, origin: Option<&str>) -> Result<IssuedSession, IssueError> {
        let now = Utc::now();
        let session = Session::new((self.generate_id)(), user.id, now);

        self.store
            .create_session(&session)
            .await
            .map_err(IssueError::Persist)?;

        let cookie = SessionCookie::new(token::encode(user.id, &session.session_id), now, origin);
        let cookie = cookie.to_header_value().map_err(|e| {
            warn!(
                user_id = user.id,
                "Session committed but cookie could not be built; session is orphaned"
            );
            IssueError::from(e)
        })?;

        debug!(user_id = user.id, secure = origin.is_some_and(is_https_origin), "Session issued");
        Ok(IssuedSession { session, cookie })
    }

    /// Header value clearing the session cookie on the client.
    pub fn clear_cookie(&self, origin: Option<&str>) -> Result<HeaderValue, InvalidHeaderValue> {
        SessionCookie::cleared(origin).to_header_value()
    }
}
