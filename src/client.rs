use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, WWW_AUTHENTICATE};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::codec;
use crate::error::Error;
use crate::flow::ProtectedBackend;
use crate::types::{BackendResponse, DischargeToken, RootToken, VerifiedAuthorization};

/// Default timeout for every outbound call. Without one, a stuck backend
/// makes the per-request latency unbounded.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ACL_ISSUE_PATH: &str = "/dev/api/acl/";
const ACL_VERIFY_PATH: &str = "/dev/api/acl/verify/";
const SSO_REFRESH_PATH: &str = "/api/v2/tokens/refresh";

const ACCEPT_JSON: &str = "application/json, application/hal+json";

/// Carton store endpoint configuration.
///
/// All fields default to the production store; override with chained
/// `with_*` methods.
///
/// ```rust,ignore
/// use carton_accounts::client::StoreConfig;
///
/// let config = StoreConfig::new()
///     .with_dashboard_url("https://dashboard.staging.carton.io".parse()?)
///     .with_permissions(vec!["package_access".into(), "package_upload".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct StoreConfig {
    pub(crate) dashboard_url: Url,
    pub(crate) sso_url: Url,
    pub(crate) permissions: Vec<String>,
    pub(crate) timeout: Duration,
    pub(crate) platform_headers: Vec<(String, String)>,
}

impl StoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dashboard_url: "https://dashboard.carton.io"
                .parse()
                .expect("valid default URL"),
            sso_url: "https://login.carton.io".parse().expect("valid default URL"),
            permissions: vec!["package_access".into()],
            timeout: DEFAULT_TIMEOUT,
            platform_headers: Vec::new(),
        }
    }

    /// Override the dashboard (ACL issuance + verification) base URL.
    #[must_use]
    pub fn with_dashboard_url(mut self, url: Url) -> Self {
        self.dashboard_url = url;
        self
    }

    /// Override the SSO (identity provider) base URL.
    #[must_use]
    pub fn with_sso_url(mut self, url: Url) -> Self {
        self.sso_url = url;
        self
    }

    /// Override the permission set requested for root macaroons
    /// (default: `["package_access"]`).
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Override the outbound call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a fixed header sent with every protected-resource request
    /// (platform identifiers the backend requires).
    #[must_use]
    pub fn with_platform_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.platform_headers.push((name.into(), value.into()));
        self
    }

    /// Dashboard base URL.
    #[must_use]
    pub fn dashboard_url(&self) -> &Url {
        &self.dashboard_url
    }

    /// SSO base URL.
    #[must_use]
    pub fn sso_url(&self) -> &Url {
        &self.sso_url
    }

    /// Permissions requested for root macaroons.
    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Location of the third-party caveat the SSO discharges: the SSO
    /// host, as the backend writes it into root macaroons.
    #[must_use]
    pub fn sso_location(&self) -> &str {
        self.sso_url.host_str().unwrap_or_default()
    }

    fn acl_issue_url(&self) -> Url {
        self.dashboard_url
            .join(ACL_ISSUE_PATH)
            .expect("valid endpoint path")
    }

    fn acl_verify_url(&self) -> Url {
        self.dashboard_url
            .join(ACL_VERIFY_PATH)
            .expect("valid endpoint path")
    }

    fn sso_refresh_url(&self) -> Url {
        self.sso_url
            .join(SSO_REFRESH_PATH)
            .expect("valid endpoint path")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct IssuanceRequest<'a> {
    permissions: &'a [String],
}

#[derive(Deserialize)]
struct IssuedMacaroon {
    macaroon: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    auth_data: AuthData<'a>,
}

#[derive(Serialize)]
struct AuthData<'a> {
    authorization: &'a str,
    http_uri: &'a str,
    http_method: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    discharge_macaroon: &'a str,
}

#[derive(Deserialize)]
struct RefreshedDischarge {
    discharge_macaroon: String,
}

/// HTTP client for the macaroon authorization lifecycle: root issuance and
/// verification at the dashboard, discharge refresh at the SSO, and
/// authorized fetches of protected resources.
pub struct AuthClient {
    config: StoreConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Requests a root macaroon scoped to a permission set (typically
    /// [`StoreConfig::permissions`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure or
    /// [`Error::BackendUnavailable`] when the endpoint answers outside 2xx.
    pub async fn request_root_macaroon(
        &self,
        permissions: &[String],
    ) -> Result<RootToken, Error> {
        tracing::debug!(?permissions, "requesting root macaroon");

        let response = self
            .http
            .post(self.config.acl_issue_url())
            .timeout(self.config.timeout)
            .header(ACCEPT, ACCEPT_JSON)
            .header(CACHE_CONTROL, "no-cache")
            .json(&IssuanceRequest { permissions })
            .send()
            .await?;

        let response = Self::ensure_success(response, "macaroon issuance").await?;
        let issued = response.json::<IssuedMacaroon>().await?;
        Ok(RootToken::from(issued.macaroon))
    }

    /// Asks the dashboard whether a bound credential authorizes a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedToken`] if the tokens do not decode,
    /// [`Error::Http`] on transport failure, or
    /// [`Error::BackendUnavailable`] when the endpoint answers outside
    /// 2xx. None of these may be swallowed — the caller's security
    /// decision depends on them.
    pub async fn verify_authorization(
        &self,
        root: &RootToken,
        discharge: &DischargeToken,
        target: &Url,
        http_method: &str,
    ) -> Result<VerifiedAuthorization, Error> {
        let authorization = codec::authorization_header(root, discharge)?;

        tracing::debug!(url = %target, method = http_method, "verifying authorization");

        let response = self
            .http
            .post(self.config.acl_verify_url())
            .timeout(self.config.timeout)
            .header(ACCEPT, ACCEPT_JSON)
            .header(CACHE_CONTROL, "no-cache")
            .json(&VerifyRequest {
                auth_data: AuthData {
                    authorization: &authorization,
                    http_uri: target.as_str(),
                    http_method,
                },
            })
            .send()
            .await?;

        let response = Self::ensure_success(response, "authorization verification").await?;
        response
            .json::<VerifiedAuthorization>()
            .await
            .map_err(Into::into)
    }

    /// Exchanges a stale discharge for a fresh one at the identity
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RefreshDenied`] when the provider rejects the
    /// refresh — the session is then fully invalid and must not be
    /// retried — or [`Error::Http`] on transport failure.
    pub async fn refresh_discharge(
        &self,
        discharge: &DischargeToken,
    ) -> Result<DischargeToken, Error> {
        tracing::debug!("refreshing discharge macaroon");

        let response = self
            .http
            .post(self.config.sso_refresh_url())
            .timeout(self.config.timeout)
            .header(ACCEPT, ACCEPT_JSON)
            .header(CACHE_CONTROL, "no-cache")
            .json(&RefreshRequest {
                discharge_macaroon: discharge.as_str(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::RefreshDenied { status, detail });
        }

        let refreshed = response.json::<RefreshedDischarge>().await?;
        Ok(DischargeToken::from(refreshed.discharge_macaroon))
    }

    /// GETs a protected dashboard resource with a bound credential.
    ///
    /// Every call recomputes the `Authorization` header — root and
    /// discharge may have changed since last use — and attaches the
    /// configured platform headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedToken`] if the tokens do not decode or
    /// [`Error::Http`] on transport failure. Rejection statuses are not
    /// errors; they come back in the [`BackendResponse`] for the
    /// authorization flow to interpret.
    pub async fn fetch_resource(
        &self,
        target: &Url,
        root: &RootToken,
        discharge: &DischargeToken,
    ) -> Result<BackendResponse, Error> {
        let authorization = codec::authorization_header(root, discharge)?;

        tracing::debug!(url = %target, "fetching protected resource");

        let mut request = self
            .http
            .get(target.clone())
            .timeout(self.config.timeout)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, ACCEPT_JSON);
        for (name, value) in &self.config.platform_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let www_authenticate = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response.bytes().await?.to_vec();

        Ok(BackendResponse {
            status,
            www_authenticate,
            content_type,
            body,
        })
    }

    /// Checks HTTP response status; returns the response on success or an
    /// error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(Error::BackendUnavailable {
            operation,
            status,
            detail,
        })
    }
}

impl ProtectedBackend for AuthClient {
    async fn fetch(
        &self,
        target: &Url,
        root: &RootToken,
        discharge: &DischargeToken,
    ) -> Result<BackendResponse, Error> {
        self.fetch_resource(target, root, discharge).await
    }

    async fn verify(
        &self,
        root: &RootToken,
        discharge: &DischargeToken,
        target: &Url,
        http_method: &str,
    ) -> Result<VerifiedAuthorization, Error> {
        self.verify_authorization(root, discharge, target, http_method).await
    }

    async fn refresh(&self, discharge: &DischargeToken) -> Result<DischargeToken, Error> {
        self.refresh_discharge(discharge).await
    }
}
