use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Redirect, Response};
use url::Url;

use crate::flow::{self, Outcome, ProtectedBackend};
use crate::session::{self, Credentials, SessionStore};
use crate::types::{BackendResponse, SessionId};

/// Redirect to the login entry point, carrying the originally requested
/// path so the handshake can return the user there.
#[must_use]
pub fn login_redirect(login_path: &str, next: &str) -> Response {
    Redirect::to(&format!("{login_path}?next={}", urlencoding::encode(next)))
        .into_response()
}

/// Serve a protected dashboard resource on behalf of the current session.
///
/// Composes the credential store and the authorization flow into the full
/// request contract:
///
/// - no usable credentials → redirect to `{login_path}?next={original_path}`;
/// - backend accepted → the backend's response, body unmodified;
/// - discharge refreshed mid-request → replacement persisted to the session;
/// - credential invalid → session cleared, redirect to login;
/// - policy denial or other backend rejection → the original error response;
/// - account valid but resource absent → `404 Resource not found`;
/// - issuance/verification backend unreachable → `503`, session untouched.
pub async fn serve_protected<S: SessionStore, B: ProtectedBackend>(
    sessions: &S,
    backend: &B,
    session_id: Option<SessionId>,
    target: &Url,
    original_path: &str,
    login_path: &str,
) -> Response {
    let Some(session_id) = session_id else {
        return login_redirect(login_path, original_path);
    };

    let credentials = match Credentials::load(sessions, &session_id).await {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!(error = %e, "Session load failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let Some((root, discharge)) = credentials.authenticated() else {
        return login_redirect(login_path, original_path);
    };

    let reply = match flow::fetch_protected(backend, root, discharge, target).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, url = %target, "Protected fetch failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authorization backend unavailable",
            )
                .into_response();
        }
    };

    if let Some(fresh) = &reply.refreshed_discharge {
        // If this write fails the next request refreshes again.
        if let Err(e) = session::store_discharge(sessions, &session_id, fresh).await {
            tracing::warn!(error = %e, "Failed to persist refreshed discharge");
        }
    }

    match reply.outcome {
        Outcome::Success(response) | Outcome::Rejected(response) => passthrough(response),
        Outcome::NotFound => (StatusCode::NOT_FOUND, "Resource not found").into_response(),
        Outcome::LoginRequired => {
            if let Err(e) = session::clear_credentials(sessions, &session_id).await {
                tracing::error!(error = %e, "Session clear failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
            login_redirect(login_path, original_path)
        }
    }
}

/// Relay a backend response to the caller unmodified.
fn passthrough(response: BackendResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut relayed = (status, response.body).into_response();
    if let Some(content_type) = response
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        relayed.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    relayed
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use axum::http::header::LOCATION;

    use super::*;
    use crate::error::Error;
    use crate::session::tests::MemoryStore;
    use crate::session::{DISCHARGE_KEY, IDENTITY_KEY, ROOT_KEY};
    use crate::types::{Account, DischargeToken, RootToken, VerifiedAuthorization};

    struct ScriptedBackend {
        responses: Mutex<VecDeque<BackendResponse>>,
        verification: Option<VerifiedAuthorization>,
        refreshed: Option<&'static str>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<BackendResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                verification: None,
                refreshed: None,
            }
        }
    }

    impl ProtectedBackend for ScriptedBackend {
        async fn fetch(
            &self,
            _target: &Url,
            _root: &RootToken,
            _discharge: &DischargeToken,
        ) -> Result<BackendResponse, Error> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra fetch"))
        }

        async fn verify(
            &self,
            _root: &RootToken,
            _discharge: &DischargeToken,
            _target: &Url,
            _http_method: &str,
        ) -> Result<VerifiedAuthorization, Error> {
            Ok(self.verification.clone().expect("verify not scripted"))
        }

        async fn refresh(&self, _discharge: &DischargeToken) -> Result<DischargeToken, Error> {
            Ok(DischargeToken::from(
                self.refreshed.expect("refresh not scripted").to_string(),
            ))
        }
    }

    fn sid() -> SessionId {
        SessionId::from("sess-1".to_string())
    }

    async fn authenticated_store() -> MemoryStore {
        let store = MemoryStore::default();
        session::store_root(&store, &sid(), &RootToken::from("root-token".to_string()))
            .await
            .unwrap();
        session::complete_login(
            &store,
            &sid(),
            &DischargeToken::from("discharge-token".to_string()),
            "https://login.carton.io/+id/fTxeWn2",
        )
        .await
        .unwrap();
        store
    }

    fn target() -> Url {
        "https://dashboard.carton.io/dev/api/packages".parse().unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    #[tokio::test]
    async fn anonymous_request_redirects_to_login_with_next() {
        let store = MemoryStore::default();
        let backend = ScriptedBackend::new(vec![]);

        let response =
            serve_protected(&store, &backend, None, &target(), "/packages/foo", "/login").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fpackages%2Ffoo");
    }

    #[tokio::test]
    async fn partial_session_redirects_to_login() {
        let store = MemoryStore::default();
        session::store_root(&store, &sid(), &RootToken::from("root-token".to_string()))
            .await
            .unwrap();
        let backend = ScriptedBackend::new(vec![]);

        let response =
            serve_protected(&store, &backend, Some(sid()), &target(), "/packages", "/login")
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fpackages");
    }

    #[tokio::test]
    async fn accepted_response_is_relayed_unmodified() {
        let store = authenticated_store().await;
        let backend = ScriptedBackend::new(vec![BackendResponse {
            status: 200,
            www_authenticate: None,
            content_type: Some("application/json".into()),
            body: b"{\"packages\": []}".to_vec(),
        }]);

        let response =
            serve_protected(&store, &backend, Some(sid()), &target(), "/packages", "/login")
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{\"packages\": []}");
        // Session untouched.
        assert!(store.get(&sid(), ROOT_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_credential_clears_session_and_redirects() {
        let store = authenticated_store().await;
        let mut backend = ScriptedBackend::new(vec![BackendResponse {
            status: 401,
            www_authenticate: None,
            content_type: None,
            body: Vec::new(),
        }]);
        backend.verification = Some(VerifiedAuthorization {
            account: None,
            allowed: false,
        });

        let response =
            serve_protected(&store, &backend, Some(sid()), &target(), "/packages", "/login")
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fpackages");
        for key in [ROOT_KEY, DISCHARGE_KEY, IDENTITY_KEY] {
            assert!(store.get(&sid(), key).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn denied_request_relays_the_original_error() {
        let store = authenticated_store().await;
        let mut backend = ScriptedBackend::new(vec![BackendResponse {
            status: 401,
            www_authenticate: None,
            content_type: None,
            body: b"denied".to_vec(),
        }]);
        backend.verification = Some(VerifiedAuthorization {
            account: Some(Account {
                openid: None,
                email: None,
                displayname: None,
                verified: None,
            }),
            allowed: false,
        });

        let response =
            serve_protected(&store, &backend, Some(sid()), &target(), "/packages", "/login")
                .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // Session retained after a policy denial.
        assert!(store.get(&sid(), ROOT_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refreshed_discharge_is_persisted() {
        let store = authenticated_store().await;
        let mut backend = ScriptedBackend::new(vec![
            BackendResponse {
                status: 401,
                www_authenticate: Some("Macaroon needs_refresh=1".into()),
                content_type: None,
                body: Vec::new(),
            },
            BackendResponse {
                status: 200,
                www_authenticate: None,
                content_type: None,
                body: b"{}".to_vec(),
            },
        ]);
        backend.refreshed = Some("fresh-discharge");

        let response =
            serve_protected(&store, &backend, Some(sid()), &target(), "/packages", "/login")
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            store.get(&sid(), DISCHARGE_KEY).await.unwrap().as_deref(),
            Some("fresh-discharge")
        );
    }
}
