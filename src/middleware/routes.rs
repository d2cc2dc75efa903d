use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::config::CartonAuthConfig;
use super::cookies;
use super::state::AuthState;
use super::traits::{IdentityResolver, OpenIdHandshake};
use crate::codec;
use crate::session::{self, Credentials, SessionStore};

/// Create the Carton authentication router.
pub fn auth_routes<O, R, S>(
    config: CartonAuthConfig,
    openid: O,
    resolver: R,
    sessions: S,
) -> Router
where
    O: OpenIdHandshake,
    R: IdentityResolver,
    S: SessionStore,
{
    let auth_path = config.settings.auth_path.clone();

    let state = AuthState {
        client: Arc::new(config.client),
        openid: Arc::new(openid),
        resolver: Arc::new(resolver),
        sessions: Arc::new(sessions),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/login"), get(login::<O, R, S>))
        .route(&format!("{auth_path}/callback"), get(callback::<O, R, S>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<O, R, S>).post(logout::<O, R, S>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    next: Option<String>,
}

async fn login<O: OpenIdHandshake, R: IdentityResolver, S: SessionStore>(
    State(state): State<AuthState<O, R, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let next = sanitize_next(params.next.as_deref(), &state.settings.login_redirect);

    let (jar, session_id) =
        match cookies::session_id(&jar, &state.settings.session_cookie_name) {
            Some(session_id) => (jar, session_id),
            None => {
                let session_id = cookies::generate_session_id();
                let cookie = cookies::session_cookie(
                    &state.settings.session_cookie_name,
                    &session_id,
                    state.settings.session_ttl_days,
                    state.settings.secure_cookies,
                );
                (jar.add(cookie), session_id)
            }
        };

    let credentials = Credentials::load(&*state.sessions, &session_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session load failed");
            login_error(&state.settings.error_redirect, "session_failed")
        })?;

    // Already signed in: straight to the destination.
    if credentials.is_authenticated() {
        return Ok((jar, Redirect::to(&next)));
    }

    let root = state
        .client
        .request_root_macaroon(state.client.config().permissions())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Root macaroon issuance failed");
            login_error(&state.settings.error_redirect, "macaroon_issuance_failed")
        })?;

    let caveat_id = codec::extract_caveat_id(&root, state.client.config().sso_location())
        .map_err(|e| {
            tracing::error!(error = %e, "Root macaroon violates the caveat contract");
            login_error(&state.settings.error_redirect, "macaroon_invalid")
        })?;

    // The root must be in place before the provider redirect; the
    // callback only adds discharge and identity.
    session::store_root(&*state.sessions, &session_id, &root)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session write failed");
            login_error(&state.settings.error_redirect, "session_failed")
        })?;

    let provider_url = state.openid.begin(&caveat_id, &next).await.map_err(|e| {
        tracing::error!(error = %e, "OpenID handshake initiation failed");
        login_error(&state.settings.error_redirect, "handshake_failed")
    })?;

    Ok((jar, Redirect::to(provider_url.as_str())))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<O: OpenIdHandshake, R: IdentityResolver, S: SessionStore>(
    State(state): State<AuthState<O, R, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let session_id = cookies::session_id(&jar, &state.settings.session_cookie_name)
        .ok_or_else(|| login_error(&state.settings.error_redirect, "missing_session"))?;

    let reply = state.openid.complete(&params).await.map_err(|e| {
        tracing::warn!(error = %e, "OpenID handshake completion failed");
        login_error(&state.settings.error_redirect, "handshake_failed")
    })?;

    state
        .resolver
        .resolve(&reply.identity_url, &reply)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Account resolution failed");
            login_error(&state.settings.error_redirect, "account_resolution_failed")
        })?;

    session::complete_login(
        &*state.sessions,
        &session_id,
        &reply.discharge,
        &reply.identity_url,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Session write failed");
        login_error(&state.settings.error_redirect, "session_failed")
    })?;

    tracing::info!(identity = %reply.identity_url, "Login successful");

    // Back to the resource that triggered the login, not a landing page.
    let next = sanitize_next(reply.return_to.as_deref(), &state.settings.login_redirect);
    Ok((jar, Redirect::to(&next)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<O: OpenIdHandshake, R: IdentityResolver, S: SessionStore>(
    State(state): State<AuthState<O, R, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    if let Some(session_id) = cookies::session_id(&jar, &state.settings.session_cookie_name) {
        if let Err(e) = session::clear_credentials(&*state.sessions, &session_id).await {
            tracing::warn!(error = %e, "Session clear failed during logout");
        }
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (
        jar.remove(clear_cookie),
        Redirect::to(&state.settings.logout_redirect),
    )
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

/// Restrict a `next` destination to same-site paths; anything else falls
/// back to the configured default. Keeps the round-tripped parameter from
/// becoming an open redirect.
fn sanitize_next(next: Option<&str>, fallback: &str) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_site_paths_pass_through() {
        assert_eq!(sanitize_next(Some("/packages/foo"), "/"), "/packages/foo");
        assert_eq!(sanitize_next(Some("/"), "/home"), "/");
    }

    #[test]
    fn foreign_destinations_fall_back() {
        assert_eq!(sanitize_next(Some("https://evil.example"), "/"), "/");
        assert_eq!(sanitize_next(Some("//evil.example/x"), "/"), "/");
        assert_eq!(sanitize_next(Some("packages"), "/"), "/");
        assert_eq!(sanitize_next(Some(""), "/"), "/");
        assert_eq!(sanitize_next(None, "/"), "/");
    }
}
