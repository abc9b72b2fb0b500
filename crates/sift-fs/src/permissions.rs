use std::path::Path;

use crate::{Error, Result};

/// Unix mode applied to every regular file written into a workspace.
pub const FILE_MODE: u32 = 0o664;

/// Unix mode applied to every directory created inside a workspace.
pub const DIR_MODE: u32 = 0o775;

/// Permission modes applied after a write.
///
/// Archive entries carry whatever mode bits their author chose. None of that
/// survives extraction: files and directories are rewritten to [`FILE_MODE`]
/// and [`DIR_MODE`] so that no host permission leaks into the workspace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Leave whatever the process umask produced.
    #[default]
    Inherit,

    /// `0o444` on Unix, the `readonly` attribute on Windows.
    ReadOnly,

    /// [`FILE_MODE`].
    File,

    /// [`DIR_MODE`].
    Directory,

    /// Explicit mode bits. Only the low nine bits are honored.
    Custom(u32),
}

impl PermissionMode {
    /// Unix mode bits for this mode, if it sets any.
    pub fn unix_mode(self) -> Option<u32> {
        match self {
            Self::Inherit => None,
            Self::ReadOnly => Some(0o444),
            Self::File => Some(FILE_MODE),
            Self::Directory => Some(DIR_MODE),
            Self::Custom(mode) => Some(mode & 0o777),
        }
    }

    pub fn apply_to_path(self, path: &Path) -> Result<()> {
        let Some(mode) = self.unix_mode() else {
            return Ok(());
        };
        set_mode(path, mode)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        Error::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut perms = metadata.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    std::fs::set_permissions(path, perms).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn modes_resolve_to_normalized_bits() {
        assert_eq!(PermissionMode::Inherit.unix_mode(), None);
        assert_eq!(PermissionMode::File.unix_mode(), Some(0o664));
        assert_eq!(PermissionMode::Directory.unix_mode(), Some(0o775));
        assert_eq!(PermissionMode::Custom(0o4755).unix_mode(), Some(0o755));
    }

    #[cfg(unix)]
    #[test]
    fn apply_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.tex");
        std::fs::write(&path, "x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777)).unwrap();

        PermissionMode::File.apply_to_path(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
    }

    #[test]
    fn inherit_is_noop_on_missing_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(PermissionMode::Inherit.apply_to_path(&missing).is_ok());
    }
}
