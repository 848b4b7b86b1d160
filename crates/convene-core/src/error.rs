use convene_models::SchemaError;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`Transport`](crate::transport::Transport). They are
/// passed to the caller exactly as the transport produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Malformed(#[from] SchemaError),
    /// A local precondition failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl EventError {
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            EventError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
