use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A scratch directory that is removed when dropped unless it is kept.
///
/// Archives are unpacked into a `Staging` first. Whatever survives
/// sanitization is moved out file by file, after which the rest goes away
/// with the guard.
#[derive(Debug)]
pub struct Staging {
    path: PathBuf,
    keep: bool,
}

impl Staging {
    /// Creates a fresh, uniquely named directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        crate::ensure_dir(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(".staging.")
            .tempdir_in(parent)
            .map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            path: dir.keep(),
            keep: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard and returns the directory path.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_staging_cleanup_on_drop() {
        let dir = tempdir().unwrap();
        let path = {
            let staging = Staging::new_in(dir.path()).unwrap();
            std::fs::write(staging.path().join("file.txt"), "data").unwrap();
            assert!(staging.path().exists());
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_keep() {
        let dir = tempdir().unwrap();
        let staging = Staging::new_in(dir.path()).unwrap();
        let path = staging.keep();
        assert!(path.is_dir());
    }
}
