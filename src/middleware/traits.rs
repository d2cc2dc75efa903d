use std::collections::HashMap;
use std::future::Future;

use url::Url;

use super::types::HandshakeReply;
use crate::error::BoxError;
use crate::types::CaveatId;

/// Consumer-provided OpenID handshake.
///
/// The redirect mechanics belong to a standard OpenID client; this crate
/// only dictates what must travel with them: the discharge caveat id goes
/// out as an extension parameter, and the original destination comes back.
///
/// # Example
///
/// ```rust,ignore
/// impl OpenIdHandshake for SsoClient {
///     async fn begin(&self, caveat_id: &CaveatId, return_to: &str) -> Result<Url, BoxError> {
///         self.checkid_setup()
///             .with_extension("macaroon", "caveat_id", caveat_id.as_str())
///             .with_return_to(return_to)
///             .redirect_url()
///     }
///
///     async fn complete(&self, params: &HashMap<String, String>) -> Result<HandshakeReply, BoxError> {
///         let response = self.verify_response(params)?;
///         Ok(HandshakeReply { /* identity, discharge, return_to, … */ })
///     }
/// }
/// ```
pub trait OpenIdHandshake: Send + Sync + 'static {
    /// Build the identity-provider redirect for an authentication request.
    ///
    /// - `caveat_id`: the root macaroon's discharge caveat, attached as an
    ///   extension parameter so the provider mints a matching discharge.
    /// - `return_to`: the originally requested path, round-tripped through
    ///   the handshake.
    fn begin(
        &self,
        caveat_id: &CaveatId,
        return_to: &str,
    ) -> impl Future<Output = Result<Url, BoxError>> + Send;

    /// Validate the provider's callback and extract its outcome.
    fn complete(
        &self,
        params: &HashMap<String, String>,
    ) -> impl Future<Output = Result<HandshakeReply, BoxError>> + Send;
}

/// Consumer-provided account bookkeeping.
///
/// Called once per completed login, before the credentials are stored.
/// Typically creates-or-loads a user record keyed by the identity URL.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Find or create the application account for an identity URL.
    ///
    /// - `identity_url`: the provider identity, same value stored as the
    ///   session's identity marker.
    /// - `reply`: transient handshake data for display or logging.
    fn resolve(
        &self,
        identity_url: &str,
        reply: &HandshakeReply,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}
