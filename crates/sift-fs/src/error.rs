use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("path has no parent directory: '{0}'")]
    NoParent(PathBuf),

    #[error("'{from}' and '{to}' are on different devices")]
    CrossDevice { from: PathBuf, to: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
