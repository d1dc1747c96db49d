use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("backend error: {0}")]
    Backend(#[from] reclaim_backend::BackendError),

    #[error("credential error: {0}")]
    Credential(#[from] reclaim_types::CredentialError),

    #[error("config error: {0}")]
    Config(String),

    #[error("status server error: {0}")]
    Status(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
