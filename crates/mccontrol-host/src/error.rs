use mccontrol_core::ControlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host loop is not running")]
    LoopClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<HostError> for ControlError {
    fn from(e: HostError) -> Self {
        ControlError::Internal(e.to_string())
    }
}

pub type HostResult<T> = Result<T, HostError>;
