use std::future::Future;

use crate::error::BoxError;
use crate::types::{DischargeToken, RootToken, SessionId};

/// Session key holding the identity-provider identity URL.
pub const IDENTITY_KEY: &str = "openid";
/// Session key holding the serialized root macaroon.
pub const ROOT_KEY: &str = "macaroon_root";
/// Session key holding the serialized discharge macaroon.
pub const DISCHARGE_KEY: &str = "macaroon_discharge";

/// Consumer-provided per-user session storage.
///
/// An opaque mutable key-value store scoped to one user session — it must
/// never be shared across users. This crate only ever touches the three
/// keys above.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for MyAppState {
///     async fn get(&self, session: &SessionId, key: &str)
///         -> Result<Option<String>, BoxError>
///     {
///         self.redis.hget(session.as_str(), key).await
///     }
///     // insert / remove analogous
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Read one session value.
    fn get(
        &self,
        session: &SessionId,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, BoxError>> + Send;

    /// Write one session value, replacing any previous one.
    fn insert(
        &self,
        session: &SessionId,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Remove one session value. Removing an absent key is not an error.
    fn remove(
        &self,
        session: &SessionId,
        key: &str,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Where a session stands in the login lifecycle, judged purely by which
/// credentials are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No usable credentials.
    Unauthenticated,
    /// Root issued and stored, discharge still pending (user is mid-way
    /// through the identity-provider redirect).
    CredentialsIssued,
    /// Root, discharge and identity all present.
    Authenticated,
}

/// Typed view over the session's three authorization fields.
///
/// Loaded from a [`SessionStore`] and passed explicitly into the
/// authorization functions; nothing in this crate reads session state
/// ambiently.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub root: Option<RootToken>,
    pub discharge: Option<DischargeToken>,
    /// Identity-provider identity URL, recorded at login completion.
    pub identity: Option<String>,
}

impl Credentials {
    /// Read the three authorization fields from the session.
    ///
    /// # Errors
    ///
    /// Propagates the store's own error type.
    pub async fn load<S: SessionStore>(
        store: &S,
        session: &SessionId,
    ) -> Result<Self, BoxError> {
        Ok(Self {
            root: store.get(session, ROOT_KEY).await?.map(RootToken::from),
            discharge: store
                .get(session, DISCHARGE_KEY)
                .await?
                .map(DischargeToken::from),
            identity: store.get(session, IDENTITY_KEY).await?,
        })
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        match (&self.root, &self.discharge, &self.identity) {
            (Some(_), Some(_), Some(_)) => AuthPhase::Authenticated,
            (Some(_), None, None) => AuthPhase::CredentialsIssued,
            // Any other partial presence is unusable.
            _ => AuthPhase::Unauthenticated,
        }
    }

    /// True only when root, discharge and identity are all present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase() == AuthPhase::Authenticated
    }

    /// The root + discharge pair, available only for authenticated
    /// sessions.
    #[must_use]
    pub fn authenticated(&self) -> Option<(&RootToken, &DischargeToken)> {
        if self.is_authenticated() {
            Some((self.root.as_ref()?, self.discharge.as_ref()?))
        } else {
            None
        }
    }
}

/// Records the freshly issued root macaroon, before the identity-provider
/// redirect.
///
/// # Errors
///
/// Propagates the store's own error type.
pub async fn store_root<S: SessionStore>(
    store: &S,
    session: &SessionId,
    root: &RootToken,
) -> Result<(), BoxError> {
    store
        .insert(session, ROOT_KEY, root.as_str().to_string())
        .await
}

/// Replaces the stored discharge, e.g. after a refresh.
///
/// # Errors
///
/// Propagates the store's own error type.
pub async fn store_discharge<S: SessionStore>(
    store: &S,
    session: &SessionId,
    discharge: &DischargeToken,
) -> Result<(), BoxError> {
    store
        .insert(session, DISCHARGE_KEY, discharge.as_str().to_string())
        .await
}

/// Records the discharge and identity returned by the completed handshake.
///
/// # Errors
///
/// Propagates the store's own error type.
pub async fn complete_login<S: SessionStore>(
    store: &S,
    session: &SessionId,
    discharge: &DischargeToken,
    identity: &str,
) -> Result<(), BoxError> {
    store_discharge(store, session, discharge).await?;
    store
        .insert(session, IDENTITY_KEY, identity.to_string())
        .await
}

/// Removes all three authorization fields — logout, or detected
/// invalidation.
///
/// # Errors
///
/// Propagates the store's own error type.
pub async fn clear_credentials<S: SessionStore>(
    store: &S,
    session: &SessionId,
) -> Result<(), BoxError> {
    store.remove(session, ROOT_KEY).await?;
    store.remove(session, DISCHARGE_KEY).await?;
    store.remove(session, IDENTITY_KEY).await
}
