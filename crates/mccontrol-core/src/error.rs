use thiserror::Error;

/// Failure taxonomy shared by every request path.
///
/// Each variant maps to one HTTP status and one caller-visible message.
/// `Internal` carries detail for the server log only; callers see a generic
/// message.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Access denied: path is outside the server directory")]
    PathEscape,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("{0}")]
    Invalid(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    pub fn unauthorized() -> Self {
        ControlError::Unauthorized("Unauthorized".into())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ControlError::Unauthorized(_) => 401,
            ControlError::MethodNotAllowed => 405,
            ControlError::PathEscape => 403,
            ControlError::NotFound(_) => 404,
            ControlError::TooLarge(_) => 413,
            ControlError::Invalid(_) => 400,
            ControlError::Internal(_) => 500,
        }
    }

    /// Message safe to put in the response envelope.
    pub fn public_message(&self) -> String {
        match self {
            ControlError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ControlError::Internal(_))
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(e: serde_json::Error) -> Self {
        ControlError::Invalid(format!("Invalid JSON: {}", e))
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
