use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use time::Duration;

use crate::types::SessionId;

/// Generates an opaque, URL-safe session identifier.
///
/// Returns a 32-character string (24 random bytes → base64url).
#[must_use]
pub(super) fn generate_session_id() -> SessionId {
    let random_bytes: [u8; 24] = rand::rng().random();
    SessionId::from(URL_SAFE_NO_PAD.encode(random_bytes))
}

/// Read the session id from the (encrypted) session cookie.
#[must_use]
pub fn session_id(jar: &PrivateCookieJar, cookie_name: &str) -> Option<SessionId> {
    jar.get(cookie_name)
        .map(|c| SessionId::from(c.value().to_string()))
}

/// Create the session cookie.
pub(super) fn session_cookie(
    name: &str,
    session_id: &SessionId,
    ttl_days: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(ttl_days))
        .build()
}

/// Create removal cookie for the session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
