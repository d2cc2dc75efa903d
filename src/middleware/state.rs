use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::traits::{IdentityResolver, OpenIdHandshake};
use crate::client::AuthClient;
use crate::session::SessionStore;

/// Shared state for auth route handlers.
pub(super) struct AuthState<O, R, S> {
    pub(super) client: Arc<AuthClient>,
    pub(super) openid: Arc<O>,
    pub(super) resolver: Arc<R>,
    pub(super) sessions: Arc<S>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding `O: Clone, R: Clone, S: Clone` bounds.
impl<O, R, S> Clone for AuthState<O, R, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            openid: self.openid.clone(),
            resolver: self.resolver.clone(),
            sessions: self.sessions.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<O: OpenIdHandshake, R: IdentityResolver, S: SessionStore> FromRef<AuthState<O, R, S>>
    for Key
{
    fn from_ref(state: &AuthState<O, R, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
