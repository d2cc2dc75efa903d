use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Serialized root macaroon issued by the dashboard ACL endpoint.
///
/// Scoped to a permission set and carrying exactly one third-party caveat
/// whose location is the SSO host. Immutable once issued; kept for the
/// lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct RootToken(pub String);

impl RootToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Serialized discharge macaroon issued by the identity provider.
///
/// Satisfies the root's third-party caveat. Replaced in place when the
/// provider refreshes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct DischargeToken(pub String);

impl DischargeToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a third-party caveat, extracted from the root macaroon.
///
/// Opaque to this crate; handed to the identity provider during login so it
/// can mint a matching discharge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct CaveatId(pub String);

impl CaveatId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque per-user session identifier (carried in the session cookie).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Account information returned by the ACL verify endpoint.
///
/// Present when the credential still maps to a store account; `None` in
/// [`VerifiedAuthorization`] means the session must be re-established.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Account {
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// Outcome of the ACL verify endpoint for a bound credential.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct VerifiedAuthorization {
    /// Account the credential maps to, if any.
    pub account: Option<Account>,
    /// Whether the credential is allowed to perform the checked request.
    #[serde(default)]
    pub allowed: bool,
}

/// Response from a protected dashboard resource, as seen by the
/// authorization flow.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    /// `WWW-Authenticate` challenge, when the backend sent one.
    pub www_authenticate: Option<String>,
    /// `Content-Type` of the body, passed through to the caller.
    pub content_type: Option<String>,
    /// Body bytes, returned to the caller unmodified on success.
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_serde_is_transparent() {
        let root = RootToken::from("MDAxY2xvY2F0aW9u".to_string());
        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, "\"MDAxY2xvY2F0aW9u\"");
        let parsed: RootToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_root(_: &RootToken) {}
        fn takes_discharge(_: &DischargeToken) {}

        let root = RootToken::from("a".to_string());
        let discharge = DischargeToken::from("a".to_string());

        takes_root(&root);
        takes_discharge(&discharge);
        // takes_root(&discharge);  // Compile error!
        // takes_discharge(&root);  // Compile error!
    }

    #[test]
    fn verified_authorization_with_null_account() {
        let v: VerifiedAuthorization =
            serde_json::from_str(r#"{"account": null, "allowed": false}"#).unwrap();
        assert!(v.account.is_none());
        assert!(!v.allowed);
    }

    #[test]
    fn verified_authorization_with_account() {
        let v: VerifiedAuthorization = serde_json::from_str(
            r#"{
                "account": {
                    "openid": "https://login.carton.io/+id/fTxeWn2",
                    "email": "dev@example.com",
                    "displayname": "Dev",
                    "verified": true
                },
                "allowed": true
            }"#,
        )
        .unwrap();
        let account = v.account.unwrap();
        assert_eq!(account.email.as_deref(), Some("dev@example.com"));
        assert!(v.allowed);
    }

    #[test]
    fn verified_authorization_allowed_defaults_to_false() {
        let v: VerifiedAuthorization = serde_json::from_str(r#"{"account": {}}"#).unwrap();
        assert!(v.account.is_some());
        assert!(!v.allowed);
    }
}
