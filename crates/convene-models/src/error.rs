use thiserror::Error;

/// A payload the remote service sent that this crate cannot represent.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("inconsistent payload: {0}")]
    Inconsistent(String),
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
