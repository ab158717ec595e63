use mccontrol_core::ControlError;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("sandbox init failed: {0}")]
    Init(String),

    #[error("path escapes sandbox root: {0}")]
    PathEscape(String),

    #[error("path does not exist")]
    NotFound,

    #[error("path is not a directory")]
    NotADirectory,

    #[error("path is a directory")]
    IsADirectory,

    #[error("file too large: {0} bytes")]
    TooLarge(u64),

    #[error("path already exists")]
    AlreadyExists,

    #[error("rename destination already exists")]
    DestinationExists,

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("cannot {0} the sandbox root")]
    RootProtected(&'static str),

    #[error("content decode failed: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FilesError> for ControlError {
    fn from(e: FilesError) -> Self {
        // The public messages below drop the detail; keep it in the log.
        debug!(error = %e, "file operation failed");
        match e {
            FilesError::PathEscape(_) => ControlError::PathEscape,
            FilesError::NotFound => ControlError::NotFound("Path does not exist".into()),
            FilesError::NotADirectory => ControlError::Invalid("Path is not a directory".into()),
            FilesError::IsADirectory => {
                ControlError::Invalid("Path is a directory, not a file".into())
            }
            FilesError::TooLarge(_) => ControlError::TooLarge("File too large (max 100MB)".into()),
            FilesError::AlreadyExists => ControlError::Invalid("Path already exists".into()),
            FilesError::DestinationExists => {
                ControlError::Invalid("A file with that name already exists".into())
            }
            FilesError::InvalidName(_) => ControlError::Invalid("Invalid file name".into()),
            FilesError::RootProtected(op) => {
                ControlError::Invalid(format!("Cannot {} server root directory", op))
            }
            FilesError::Decode(_) => ControlError::Invalid("Content is not valid base64".into()),
            FilesError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                ControlError::NotFound("Path does not exist".into())
            }
            other => ControlError::Internal(other.to_string()),
        }
    }
}

pub type FilesResult<T> = Result<T, FilesError>;
