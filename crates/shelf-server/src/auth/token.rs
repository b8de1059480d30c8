//! Session token codec.
//!
//! A token is `"<userID>-<sessionID>"`. Decoding splits on every separator and
//! requires exactly two parts, so a session id that itself contains `-` never
//! decodes. Issued session ids are hyphen-free for that reason.

use thiserror::Error;

/// Separator between the user id and the session id.
pub const SEPARATOR: char = '-';

/// Token decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid session token format")]
    InvalidFormat,
}

/// Build the cookie value for a session.
pub fn encode(user_id: i64, session_id: &str) -> String {
    format!("{user_id}{SEPARATOR}{session_id}")
}

/// Split a cookie value back into `(user_id, session_id)`.
pub fn decode(token: &str) -> Result<(i64, String), TokenError> {
    let parts: Vec<&str> = token.split(SEPARATOR).collect();
    let [user_id, session_id] = parts.as_slice() else {
        return Err(TokenError::InvalidFormat);
    };

    let user_id = user_id
        .parse::<i64>()
        .map_err(|_| TokenError::InvalidFormat)?;
    if session_id.is_empty() {
        return Err(TokenError::InvalidFormat);
    }

    Ok((user_id, session_id.to_string()))
}
