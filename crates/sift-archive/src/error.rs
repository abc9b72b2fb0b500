use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("archive is corrupted: {0}")]
    Corrupted(String),

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("filesystem operation failed: {source}")]
    Fs { source: sift_fs::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<sift_fs::Error> for Error {
    fn from(e: sift_fs::Error) -> Self {
        Self::Fs { source: e }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
