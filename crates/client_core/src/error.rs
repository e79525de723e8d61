use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Every failure carries the message shown to the user; remote messages are
/// passed through unchanged.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{0}")]
    Remote(#[from] ApiError),
    #[error("{0}")]
    Transport(String),
    #[error("invalid response from backend: {0}")]
    Decode(String),
    #[error("No active session")]
    NoSession,
    #[error("{0}")]
    Validation(String),
    #[error("Cannot delete branch with active employees")]
    BranchInUse,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Rejections matching this clear the signed-in user and send the app
    /// back to the login route.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ClientError::Remote(err) if err.code == ErrorCode::Unauthorized => true,
            other => other.to_string().to_ascii_lowercase().contains("unauthorized"),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ClientError::Decode(value.to_string())
        } else {
            ClientError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        ClientError::Decode(value.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
