use crate::types::DischargeToken;

/// Outcome of a completed OpenID handshake.
///
/// Produced by [`OpenIdHandshake::complete`](super::OpenIdHandshake::complete)
/// and handed to [`IdentityResolver::resolve`](super::IdentityResolver::resolve)
/// before the credentials are written to the session.
///
/// `email` and `full_name` are transient provider data — use them for
/// display or logging at login time, not as the account key; the identity
/// URL is the durable link.
#[derive(Debug, Clone)]
pub struct HandshakeReply {
    /// Identity-provider identity URL; stored as the session's identity
    /// marker.
    pub identity_url: String,
    /// Discharge macaroon minted for the login's caveat id.
    pub discharge: DischargeToken,
    /// Original destination, round-tripped through the handshake.
    pub return_to: Option<String>,
    /// Provider-reported email, if requested and released.
    pub email: Option<String>,
    /// Provider-reported display name, if requested and released.
    pub full_name: Option<String>,
}
