use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AuthError;
use crate::client::{AuthClient, StoreConfig};

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__carton_session".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: String::new(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
            error_redirect: "/".into(),
        }
    }

    /// Path of the login entry point, used for unauthenticated redirects.
    pub(crate) fn login_path(&self) -> String {
        format!("{}/login", self.auth_path)
    }
}

/// Carton authentication configuration.
///
/// Required field (`client`) is a constructor parameter — no runtime
/// "missing field" errors.
///
/// Use [`from_env()`](CartonAuthConfig::from_env) for convention-based
/// setup, or [`new()`](CartonAuthConfig::new) with `with_*` methods for
/// full control.
pub struct CartonAuthConfig {
    pub(super) client: AuthClient,
    pub(super) settings: AuthSettings,
}

impl CartonAuthConfig {
    /// Create config with the required [`AuthClient`].
    ///
    /// All optional fields use sensible defaults. Override with `with_*`
    /// methods.
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `CARTON_DASHBOARD_URL`: Override the dashboard base URL
    /// - `CARTON_SSO_URL`: Override the identity-provider base URL
    /// - `CARTON_PERMISSIONS`: Comma-separated permission set for root
    ///   macaroons
    /// - `CARTON_TIMEOUT_SECS`: Outbound call timeout in seconds
    /// - `DEV_AUTH`: Set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let mut store = StoreConfig::new();

        if let Ok(url_str) = std::env::var("CARTON_DASHBOARD_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| AuthError::Config(format!("CARTON_DASHBOARD_URL: {e}")))?;
            store = store.with_dashboard_url(url);
        }
        if let Ok(url_str) = std::env::var("CARTON_SSO_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| AuthError::Config(format!("CARTON_SSO_URL: {e}")))?;
            store = store.with_sso_url(url);
        }
        if let Ok(permissions) = std::env::var("CARTON_PERMISSIONS") {
            store = store
                .with_permissions(permissions.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Ok(secs) = std::env::var("CARTON_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| AuthError::Config(format!("CARTON_TIMEOUT_SECS: {e}")))?;
            store = store.with_timeout(Duration::from_secs(secs));
        }

        let dev_auth = matches!(std::env::var("DEV_AUTH").as_deref(), Ok("1") | Ok("true"));

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(AuthClient::new(store))
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth))
    }

    /// Path of the login entry point, as mounted by
    /// [`auth_routes`](super::auth_routes). Feed this to
    /// [`serve_protected`](super::serve_protected) so unauthenticated
    /// requests land on the right route.
    #[must_use]
    pub fn login_path(&self) -> String {
        self.settings.login_path()
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Prefix for the login/callback/logout routes (default: none, i.e.
    /// `/login`, `/callback`, `/logout`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Fallback destination after login when no `next` parameter survives.
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    /// Destination for failed logins; an `error` query parameter names the
    /// failure.
    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_path_honors_auth_prefix() {
        let mut settings = AuthSettings::defaults();
        assert_eq!(settings.login_path(), "/login");

        settings.auth_path = "/api/auth".into();
        assert_eq!(settings.login_path(), "/api/auth/login");
    }

    #[test]
    fn builder_overrides_settings() {
        let config = CartonAuthConfig::new(AuthClient::new(StoreConfig::new()))
            .with_session_cookie_name("__staging_session")
            .with_session_ttl_days(7)
            .with_secure_cookies(false)
            .with_auth_path("/api/auth")
            .with_login_redirect("/dashboard")
            .with_logout_redirect("/bye")
            .with_error_redirect("/login-failed");

        assert_eq!(config.settings.session_cookie_name, "__staging_session");
        assert_eq!(config.settings.session_ttl_days, 7);
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.settings.login_path(), "/api/auth/login");
        assert_eq!(config.settings.login_redirect, "/dashboard");
        assert_eq!(config.settings.logout_redirect, "/bye");
        assert_eq!(config.settings.error_redirect, "/login-failed");
    }
}
