use thiserror::Error;

/// Failures while building an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("base URL {0} cannot carry a path")]
    NotABase(String),
    #[error("missing bot token")]
    MissingToken,
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
