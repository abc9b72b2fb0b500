use crate::check::CheckError;
use crate::workspace::Status;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("workspace '{0}' is locked")]
    WorkspaceLocked(String),

    #[error("workspace '{id}' is {status}, cannot {operation}")]
    InvalidState {
        id: String,
        status: Status,
        operation: &'static str,
    },

    #[error("'{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidPath(sift_archive::Error),

    #[error("unpack failed: {0}")]
    Unpack(#[source] sift_archive::Error),

    #[error("storage failed: {0}")]
    Storage(#[from] sift_store::Error),

    #[error("checking failed: {0}")]
    Check(#[from] CheckError),

    #[error("operation requires the {0} capability")]
    PermissionDenied(&'static str),

    #[error("workspace '{0}' is busy, retry later")]
    Busy(String),

    #[error("metadata for workspace '{id}': {reason}")]
    Metadata { id: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    /// Whether the same call may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy(_) | Self::Storage(_) | Self::Check(CheckError::Storage(_))
        )
    }
}

impl From<sift_archive::Error> for Error {
    fn from(e: sift_archive::Error) -> Self {
        match e {
            sift_archive::Error::InvalidPath(_) => Self::InvalidPath(e),
            other => Self::Unpack(other),
        }
    }
}

impl From<sift_fs::Error> for Error {
    fn from(e: sift_fs::Error) -> Self {
        Self::Storage(sift_store::Error::Fs(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
