use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no content stored at '{0}'")]
    NotFound(String),

    #[error("invalid storage location '{0}'")]
    InvalidLocation(String),

    #[error("storage I/O failed at '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("checksum mismatch after copying '{location}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        location: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Fs(#[from] sift_fs::Error),

    #[error(transparent)]
    Verify(#[from] sift_verify::VerificationError),

    #[error("storage has been purged")]
    Purged,
}

pub type Result<T> = std::result::Result<T, Error>;
