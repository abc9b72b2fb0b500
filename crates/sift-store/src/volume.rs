use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sift_fs::{AtomicWriteOptions, FallbackStrategy, MoveOptions, Moved, PermissionMode};

use crate::{Error, Location, Result};

/// One directory tree of stored files.
#[derive(Debug, Clone)]
pub(crate) struct Volume {
    root: PathBuf,
}

impl Volume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, location: &Location) -> PathBuf {
        location.under(&self.root)
    }

    pub fn exists(&self, location: &Location) -> bool {
        self.path(location).is_file()
    }

    pub fn put(&self, location: &Location, bytes: &[u8]) -> Result<u64> {
        let path = self.prepare(location)?;
        Ok(sift_fs::atomic_write(
            &path,
            bytes,
            AtomicWriteOptions::new().permissions(PermissionMode::File),
        )?)
    }

    /// Moves `from` into the volume. The source is gone afterwards.
    pub fn put_file(&self, location: &Location, from: &Path) -> Result<u64> {
        let path = self.prepare(location)?;
        let options = MoveOptions::new()
            .fallback(FallbackStrategy::Copy)
            .permissions(PermissionMode::File);
        if sift_fs::move_file(from, &path, options)? == Moved::Copied {
            sift_fs::remove_file_if_exists(from)?;
        }
        self.size(location)
    }

    pub fn get(&self, location: &Location) -> Result<Vec<u8>> {
        let path = self.path(location);
        fs::read(&path).map_err(|e| not_found_or_io(location, path, e))
    }

    pub fn open(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        let path = self.path(location);
        let file = File::open(&path).map_err(|e| not_found_or_io(location, path, e))?;
        Ok(Box::new(file))
    }

    pub fn size(&self, location: &Location) -> Result<u64> {
        let path = self.path(location);
        fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| not_found_or_io(location, path, e))
    }

    pub fn checksum(&self, location: &Location) -> Result<String> {
        if !self.exists(location) {
            return Err(Error::NotFound(location.to_string()));
        }
        Ok(sift_verify::checksum_file(self.path(location))?)
    }

    /// Renames within the volume. Overwrites `to`.
    pub fn rename(&self, from: &Location, to: &Location) -> Result<()> {
        if !self.exists(from) {
            return Err(Error::NotFound(from.to_string()));
        }
        let dest = self.prepare(to)?;
        let source = self.path(from);
        if sift_fs::move_file(&source, dest, MoveOptions::new())? == Moved::Copied {
            sift_fs::remove_file_if_exists(&source)?;
        }
        self.prune(from);
        Ok(())
    }

    pub fn copy(&self, from: &Location, to: &Location) -> Result<u64> {
        if !self.exists(from) {
            return Err(Error::NotFound(from.to_string()));
        }
        let dest = self.prepare(to)?;
        Ok(sift_fs::copy_file(
            self.path(from),
            dest,
            PermissionMode::File,
        )?)
    }

    pub fn delete(&self, location: &Location) -> Result<bool> {
        let removed = sift_fs::remove_file_if_exists(self.path(location))?;
        if removed {
            self.prune(location);
        }
        Ok(removed)
    }

    /// Every stored file, sorted.
    pub fn list(&self) -> Result<Vec<Location>> {
        let mut out = Vec::new();
        if self.root.is_dir() {
            walk(&self.root, &self.root, &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn prepare(&self, location: &Location) -> Result<PathBuf> {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            sift_fs::ensure_dir(parent)?;
        }
        Ok(path)
    }

    /// Removes directories left empty by a delete or rename.
    pub fn prune(&self, location: &Location) {
        let mut dir = self.path(location).parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || fs::remove_dir(&current).is_err() {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<Location>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let joined = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Ok(location) = Location::new(joined) {
                out.push(location);
            }
        }
    }
    Ok(())
}

fn not_found_or_io(location: &Location, path: PathBuf, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(location.to_string())
    } else {
        Error::Io { path, source: e }
    }
}
