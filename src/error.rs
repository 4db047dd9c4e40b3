use reqwest::StatusCode;
use thiserror::Error;

/// Shown when a failure carries nothing more specific.
pub const GENERIC_FAILURE: &str = "Network error or server unavailable";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("failed to read response: {0}")]
    Body(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Body(e) => e.status(),
            _ => None,
        }
    }

    /// The server's own explanation, if it sent a usable one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Text fit for a notification: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ApiError::Rejected { .. } => GENERIC_FAILURE.to_string(),
            ApiError::MissingField(_) | ApiError::Decode(_) => "Invalid response format".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
