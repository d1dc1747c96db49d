use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum BackendError {
    /// Connection-level failure — the service could not be reached at all.
    #[error("claim service unreachable: {0}")]
    Offline(String),

    /// The service answered and refused the request.
    #[error("claim service rejected the request: {0}")]
    Rejected(String),

    #[error("claim service returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("malformed claim service response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Whether this error means the network itself is down, as opposed to a
    /// reachable service saying no.
    pub fn is_offline(&self) -> bool {
        matches!(self, BackendError::Offline(_))
    }
}
