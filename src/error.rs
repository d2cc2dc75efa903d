/// Boxed error type used at consumer-implemented trait seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Macaroon bytes do not decode. Fatal for the current request; the
    /// session holding the token must be treated as invalid.
    #[error("malformed macaroon token: {0}")]
    MalformedToken(String),

    /// The root macaroon does not carry exactly one third-party caveat for
    /// the expected location. Indicates a backend contract violation.
    #[error("expected exactly one third-party caveat for {location}, found {found}")]
    CaveatCount { location: String, found: usize },

    /// An issuance or verification endpoint answered outside 2xx.
    /// Retryable; the session is untouched.
    #[error("{operation} failed: backend returned {status}: {detail}")]
    BackendUnavailable {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// Transport-level failure talking to a backend. Retryable; the
    /// session is untouched.
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity provider refused to refresh the discharge. The session
    /// is fully invalid; do not retry.
    #[error("identity provider refused to refresh the discharge ({status}): {detail}")]
    RefreshDenied { status: u16, detail: String },
}
