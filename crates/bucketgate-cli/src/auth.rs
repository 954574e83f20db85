//! Password check and session token presentation

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bucketgate_core::{Session, SessionStore};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Compare a presented password with the configured one.
///
/// Both sides are hashed first so the comparison runs over fixed-length
/// digests; `blake3::Hash` equality is constant time.
pub fn verify_password(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    blake3::hash(presented.as_bytes()) == blake3::hash(expected.as_bytes())
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Presented session tokens in precedence order: cookie, then `Authorization: Bearer`
pub fn presented_tokens(jar: &CookieJar, headers: &HeaderMap) -> Vec<String> {
    let cookie = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);

    let mut tokens: Vec<String> = Vec::with_capacity(2);
    for token in cookie.into_iter().chain(bearer) {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// First presented token naming a live session.
///
/// A stale cookie does not hide a valid bearer token.
pub fn authenticated_token(jar: &CookieJar, headers: &HeaderMap, sessions: &SessionStore) -> Option<String> {
    presented_tokens(jar, headers)
        .into_iter()
        .find(|token| sessions.validate(token))
}

/// Cookie carrying a freshly issued session, living as long as the session
pub fn session_cookie(session: &Session, ttl_secs: u64, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Cookie that clears the session on the client
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
