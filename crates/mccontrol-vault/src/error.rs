use mccontrol_core::ControlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key error: {0}")]
    Key(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("authentication rejected")]
    Rejected,

    #[error("session error: {0}")]
    Session(String),
}

impl From<VaultError> for ControlError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Rejected | VaultError::Decryption(_) => {
                ControlError::Unauthorized("Invalid API key".into())
            }
            VaultError::Malformed(msg) => ControlError::Invalid(msg),
            other => ControlError::Internal(other.to_string()),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
