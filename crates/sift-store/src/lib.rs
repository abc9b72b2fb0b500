//! Storage adapters for sift workspaces.
//!
//! A workspace never touches file paths directly. It addresses content by
//! [`Location`] through a [`StorageAdapter`], chosen once at creation from a
//! [`StorageConfig`]. Every operation is safe to retry: deleting a missing
//! location succeeds, persisting twice is a no-op, and checksums are always
//! recomputed from the bytes currently stored.

use std::fmt::Debug;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use error::{Error, Result};
pub use location::Location;
pub use quarantine::Quarantine;
pub use single::SingleVolume;
pub use sift_fs::Staging;

mod error;
mod location;
mod quarantine;
mod single;
mod volume;

/// Outcome of [`StorageAdapter::persist`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persisted {
    /// Renamed onto the durable volume.
    Moved,
    /// Copied across devices, verified, and the quarantined copy removed.
    Copied,
    /// Nothing to do.
    AlreadyDurable,
}

pub trait StorageAdapter: Send + Sync + Debug {
    /// Writes `bytes` atomically, replacing existing content.
    fn put(&self, location: &Location, bytes: &[u8]) -> Result<u64>;

    /// Moves a file (typically from a scratch directory) into storage.
    fn put_file(&self, location: &Location, from: &Path) -> Result<u64>;

    fn get(&self, location: &Location) -> Result<Vec<u8>>;

    fn open(&self, location: &Location) -> Result<Box<dyn Read + Send>>;

    /// Renames a stored file, replacing whatever is stored at `to`.
    fn move_to(&self, from: &Location, to: &Location) -> Result<()>;

    fn copy(&self, from: &Location, to: &Location) -> Result<u64>;

    /// Returns whether anything was removed. Missing content is not an error.
    fn delete(&self, location: &Location) -> Result<bool>;

    /// Lowercase hex SHA-256 of the current content.
    fn checksum(&self, location: &Location) -> Result<String>;

    fn size(&self, location: &Location) -> Result<u64>;

    fn exists(&self, location: &Location) -> bool;

    fn list(&self) -> Result<Vec<Location>>;

    fn persist(&self, location: &Location) -> Result<Persisted>;

    fn is_persisted(&self, location: &Location) -> bool;

    /// A fresh scratch directory on the fast volume, removed on drop.
    fn scratch_dir(&self) -> Result<Staging>;

    /// Removes all content. Later calls fail with [`Error::Purged`].
    fn purge(&self) -> Result<()>;
}

/// Which adapter a workspace gets, and where its roots live.
///
/// Each workspace gets its own subdirectory named by its id under every root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Single {
        root: PathBuf,
    },
    Quarantine {
        ephemeral_root: PathBuf,
        durable_root: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Single {
            root: PathBuf::from("sift-data"),
        }
    }
}

impl StorageConfig {
    pub fn open(&self, workspace: &str) -> Result<Box<dyn StorageAdapter>> {
        let workspace = Location::new(workspace)?;
        let adapter: Box<dyn StorageAdapter> = match self {
            Self::Single { root } => Box::new(SingleVolume::new(workspace.under(root))?),
            Self::Quarantine {
                ephemeral_root,
                durable_root,
            } => Box::new(Quarantine::new(
                workspace.under(ephemeral_root),
                workspace.under(durable_root),
            )?),
        };
        tracing::debug!(%workspace, config = ?self, "opened storage");
        Ok(adapter)
    }
}
