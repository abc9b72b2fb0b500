use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::{Error, PermissionMode, Result};

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    pub permissions: PermissionMode,
    pub sync: bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            permissions: PermissionMode::File,
            sync: false,
        }
    }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissions(mut self, mode: PermissionMode) -> Self {
        self.permissions = mode;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Writes `content` to `path` through a sibling temporary file.
///
/// Readers observe either the old content or the new content, never a torn
/// write. The parent directory must already exist.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<u64> {
    atomic_write_from(path, &mut io::Cursor::new(content), options)
}

/// Streaming variant of [`atomic_write`]. Returns the number of bytes written.
pub fn atomic_write_from(
    path: impl AsRef<Path>,
    reader: &mut dyn Read,
    options: AtomicWriteOptions,
) -> Result<u64> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| Error::NoParent(path.to_path_buf()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp.")
        .suffix(".sift")
        .tempfile_in(parent)
        .map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;

    let written = io::copy(reader, tmp.as_file_mut()).map_err(|e| Error::Write {
        path: tmp.path().to_path_buf(),
        source: e,
    })?;
    tmp.as_file_mut().flush().map_err(|e| Error::Write {
        path: tmp.path().to_path_buf(),
        source: e,
    })?;

    options.permissions.apply_to_path(tmp.path())?;

    if options.sync {
        tmp.as_file().sync_all().map_err(|e| Error::Write {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;
    }

    tmp.persist(path).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(written)
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.tex");
        let n = atomic_write(&path, b"\\documentclass{article}", AtomicWriteOptions::new()).unwrap();
        assert_eq!(n, 23);
        assert_eq!(fs::read(&path).unwrap(), b"\\documentclass{article}");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        atomic_write(&path, b"one", AtomicWriteOptions::new()).unwrap();
        atomic_write(&path, b"two", AtomicWriteOptions::new()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(
            &path,
            b"data",
            AtomicWriteOptions::new().permissions(PermissionMode::Custom(0o600)),
        )
        .unwrap();
        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_atomic_write_missing_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("file.txt");
        let err = atomic_write(&path, b"x", AtomicWriteOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }
}
