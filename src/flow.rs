//! Decision logic for authorized calls against protected store resources.
//!
//! The decision functions are pure; [`fetch_protected`] drives them over a
//! [`ProtectedBackend`], the only I/O seam. Per logical request the flow
//! issues at most three sequential calls: the primary fetch, an optional
//! verify, an optional refresh plus exactly one retry.

use std::future::Future;

use url::Url;

use crate::error::Error;
use crate::types::{BackendResponse, DischargeToken, RootToken, VerifiedAuthorization};

/// Outbound operations the authorization flow depends on.
///
/// Implemented by [`AuthClient`](crate::client::AuthClient); tests provide
/// scripted implementations.
pub trait ProtectedBackend: Send + Sync {
    /// GET a protected resource with a bound root + discharge credential.
    fn fetch(
        &self,
        target: &Url,
        root: &RootToken,
        discharge: &DischargeToken,
    ) -> impl Future<Output = Result<BackendResponse, Error>> + Send;

    /// Ask the ACL verify endpoint whether the credential still authorizes
    /// the request.
    fn verify(
        &self,
        root: &RootToken,
        discharge: &DischargeToken,
        target: &Url,
        http_method: &str,
    ) -> impl Future<Output = Result<VerifiedAuthorization, Error>> + Send;

    /// Exchange a stale discharge for a fresh one at the identity provider.
    fn refresh(
        &self,
        discharge: &DischargeToken,
    ) -> impl Future<Output = Result<DischargeToken, Error>> + Send;
}

/// How a protected-resource request concluded.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The backend accepted the credential; body passed through unmodified.
    Success(BackendResponse),
    /// The credential maps to an account but the backend rejected the
    /// request; the original response is surfaced and the session kept.
    Rejected(BackendResponse),
    /// The account is valid but the resource does not exist. Distinct from
    /// a denial.
    NotFound,
    /// The credential no longer maps to any account, or refreshing it was
    /// refused. The session must be cleared and the user sent to login.
    LoginRequired,
}

/// Result of [`fetch_protected`].
///
/// When the flow refreshed the discharge mid-request the replacement is
/// returned here for the caller to persist; the flow itself never touches
/// session state.
#[derive(Debug, Clone)]
pub struct ProtectedReply {
    pub outcome: Outcome,
    pub refreshed_discharge: Option<DischargeToken>,
}

/// True when the response challenges the client to refresh its discharge
/// (`WWW-Authenticate: Macaroon needs_refresh=1`).
#[must_use]
pub fn discharge_required(response: &BackendResponse) -> bool {
    response.www_authenticate.as_deref().is_some_and(|challenge| {
        let mut parts = challenge.splitn(2, ' ');
        parts.next() == Some("Macaroon")
            && parts
                .next()
                .is_some_and(|params| params.split(',').any(|p| p.trim() == "needs_refresh=1"))
    })
}

/// How a rejected (≥ 400) response resolves once the credential has been
/// re-verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No account behind the credential: re-login required.
    Invalid,
    /// Account exists but is not allowed: surface the original error.
    Denied,
    /// Account exists, resource does not.
    NotFound,
    /// Some other backend error; surface it unchanged.
    Passthrough,
}

/// Classifies a rejected response against the verify endpoint's answer.
///
/// The arms are ordered: a missing account always wins, an explicit
/// 401-and-not-allowed beats everything but that, and a 404 with a valid
/// account is a resource-level miss rather than an authorization failure.
#[must_use]
pub fn resolve_rejection(status: u16, verification: &VerifiedAuthorization) -> Rejection {
    match (&verification.account, status) {
        (None, _) => Rejection::Invalid,
        (Some(_), 401) if !verification.allowed => Rejection::Denied,
        (Some(_), 404) => Rejection::NotFound,
        (Some(_), _) => Rejection::Passthrough,
    }
}

/// Fetches a protected resource, refreshing the discharge at most once and
/// re-verifying any rejection.
///
/// # Errors
///
/// Transport and backend-availability failures propagate — the caller's
/// security decision depends on them, so they are never mapped to a
/// policy outcome. A provider-refused refresh is not an error here; it
/// resolves to [`Outcome::LoginRequired`].
pub async fn fetch_protected<B: ProtectedBackend>(
    backend: &B,
    root: &RootToken,
    discharge: &DischargeToken,
    target: &Url,
) -> Result<ProtectedReply, Error> {
    let mut discharge = discharge.clone();
    let mut refreshed_discharge = None;

    let mut response = backend.fetch(target, root, &discharge).await?;

    if discharge_required(&response) {
        tracing::debug!(url = %target, "backend challenged for a discharge refresh");
        match backend.refresh(&discharge).await {
            Ok(fresh) => {
                discharge = fresh.clone();
                refreshed_discharge = Some(fresh);
            }
            Err(Error::RefreshDenied { status, .. }) => {
                tracing::warn!(status, "identity provider refused to refresh the discharge");
                return Ok(ProtectedReply {
                    outcome: Outcome::LoginRequired,
                    refreshed_discharge: None,
                });
            }
            Err(other) => return Err(other),
        }

        response = backend.fetch(target, root, &discharge).await?;

        // One refresh per logical request. A backend still challenging
        // after a fresh discharge will never accept this credential.
        if discharge_required(&response) {
            tracing::warn!(url = %target, "refresh challenge repeated after retry");
            return Ok(ProtectedReply {
                outcome: Outcome::LoginRequired,
                refreshed_discharge: None,
            });
        }
    }

    if response.status < 400 {
        return Ok(ProtectedReply {
            outcome: Outcome::Success(response),
            refreshed_discharge,
        });
    }

    let verification = backend.verify(root, &discharge, target, "GET").await?;
    let outcome = match resolve_rejection(response.status, &verification) {
        Rejection::Invalid => {
            tracing::warn!(status = response.status, "credential no longer maps to an account");
            Outcome::LoginRequired
        }
        Rejection::Denied => {
            tracing::warn!(status = response.status, "authorization denied by policy");
            Outcome::Rejected(response)
        }
        Rejection::NotFound => Outcome::NotFound,
        Rejection::Passthrough => Outcome::Rejected(response),
    };

    Ok(ProtectedReply {
        outcome,
        refreshed_discharge,
    })
}
