use std::fs;
use std::io;
use std::path::Path;

use crate::{Error, PermissionMode, Result};

/// What to do when a rename crosses a filesystem boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    #[default]
    Copy,
    Error,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOptions {
    pub fallback: FallbackStrategy,
    pub permissions: PermissionMode,
}

impl MoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn permissions(mut self, mode: PermissionMode) -> Self {
        self.permissions = mode;
        self
    }
}

/// Outcome of [`move_file`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Moved {
    /// The source was renamed onto the destination and no longer exists.
    Renamed,
    /// The rename crossed devices. The destination is a copy and the source
    /// is still in place; the caller decides when it is safe to delete it.
    Copied,
}

/// Moves `src` to `dest`, creating parent directories of `dest` as needed.
pub fn move_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: MoveOptions,
) -> Result<Moved> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if let Some(parent) = dest.parent() {
        crate::ensure_dir(parent)?;
    }

    match fs::rename(src, dest) {
        Ok(()) => {
            options.permissions.apply_to_path(dest)?;
            Ok(Moved::Renamed)
        }
        Err(e) if is_cross_device(&e) => match options.fallback {
            FallbackStrategy::Copy => {
                copy_file(src, dest, options.permissions)?;
                Ok(Moved::Copied)
            }
            FallbackStrategy::Error => Err(Error::CrossDevice {
                from: src.to_path_buf(),
                to: dest.to_path_buf(),
            }),
        },
        Err(e) => Err(Error::Write {
            path: dest.to_path_buf(),
            source: e,
        }),
    }
}

/// Copies a regular file, creating parent directories of `dest` as needed.
pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>, mode: PermissionMode) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if let Some(parent) = dest.parent() {
        crate::ensure_dir(parent)?;
    }

    let mut reader = fs::File::open(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    crate::atomic_write_from(
        dest,
        &mut reader,
        crate::AtomicWriteOptions::new().permissions(mode),
    )
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18)
}
