use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Issuance, verification or refresh backend failed.
    #[error("Backend error: {0}")]
    Backend(#[from] crate::error::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Backend(ref e) => {
                tracing::error!(error = %e, "Authorization backend failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Authorization backend unavailable",
                )
                    .into_response()
            }
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
