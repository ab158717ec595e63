use thiserror::Error;

/// Errors from startup, configuration and the CLI. Request-path failures use
/// `ControlError` instead.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("vault error: {0}")]
    Vault(#[from] mccontrol_vault::VaultError),

    #[error("files error: {0}")]
    Files(#[from] mccontrol_files::FilesError),

    #[error("host error: {0}")]
    Host(#[from] mccontrol_host::HostError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
