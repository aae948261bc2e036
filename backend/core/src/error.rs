use thiserror::Error;

/// Why an inbound webhook failed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing X-Line-Signature header")]
    MissingSignature,

    #[error("signature header is not valid base64")]
    MalformedSignature,

    #[error("signature does not match request body")]
    InvalidSignature,
}

/// Top-level error type for the lineecho pipeline.
///
/// Only `Auth` and `Internal` ever change the webhook's HTTP status; the other
/// variants are logged by the caller and the pipeline continues.
#[derive(Debug, Error)]
pub enum EchoError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("messaging API error ({api}): {message}")]
    Upstream { api: String, message: String },

    #[error("storage error at {path}: {message}")]
    Storage { path: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl EchoError {
    pub fn upstream(api: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream {
            api: api.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        Self::Storage {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = EchoError> = std::result::Result<T, E>;
