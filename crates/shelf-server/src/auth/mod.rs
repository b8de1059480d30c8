//! Session authentication.
//!
//! - [`token`]: the `"<userID>-<sessionID>"` cookie value codec
//! - [`interceptor`]: the per-call gate and its allow-list
//! - [`middleware`]: axum adapter around the interceptor
//! - [`issuer`]: session creation and the response cookie
//! - [`password`]: Argon2id hashing for stored credentials

pub mod interceptor;
pub mod issuer;
pub mod middleware;
pub mod password;
pub mod token;

pub use interceptor::{
    AllowList, AuthError, AuthInterceptor, AuthenticatedIdentity, CallMetadata,
    SESSION_COOKIE_NAME, extract_session_cookie,
};
pub use issuer::{IssueError, IssuedSession, SameSite, SessionCookie, SessionIssuer};
pub use middleware::auth_middleware;
pub use token::TokenError;
