use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use sift_fs::{FallbackStrategy, MoveOptions, Moved, PermissionMode, Staging};

use crate::volume::Volume;
use crate::{Error, Location, Persisted, Result, StorageAdapter};

/// Two-tier storage.
///
/// Unpacking and checking happen on a fast ephemeral root. [`persist`] moves
/// a file to the durable root, which may live on slower shared media. Reads
/// prefer the quarantined copy and fall back to the durable one, so a file
/// that was replaced after being persisted shadows its durable version until
/// it is persisted again.
///
/// [`persist`]: StorageAdapter::persist
#[derive(Debug)]
pub struct Quarantine {
    ephemeral_root: PathBuf,
    durable_root: PathBuf,
    quarantine: Volume,
    durable: Volume,
    purged: AtomicBool,
}

impl Quarantine {
    pub fn new(ephemeral_root: impl Into<PathBuf>, durable_root: impl Into<PathBuf>) -> Result<Self> {
        let ephemeral_root = ephemeral_root.into();
        let durable_root = durable_root.into();
        let quarantine = Volume::new(ephemeral_root.join("files"));
        let durable = Volume::new(durable_root.join("files"));
        sift_fs::ensure_dir(quarantine.root())?;
        sift_fs::ensure_dir(durable.root())?;
        Ok(Self {
            ephemeral_root,
            durable_root,
            quarantine,
            durable,
            purged: AtomicBool::new(false),
        })
    }

    fn live(&self) -> Result<()> {
        if self.purged.load(Ordering::Acquire) {
            Err(Error::Purged)
        } else {
            Ok(())
        }
    }

    /// Volume currently holding `location`, quarantine first.
    fn holder(&self, location: &Location) -> Result<&Volume> {
        if self.quarantine.exists(location) {
            Ok(&self.quarantine)
        } else if self.durable.exists(location) {
            Ok(&self.durable)
        } else {
            Err(Error::NotFound(location.to_string()))
        }
    }

    fn promote(&self, location: &Location) -> Result<Persisted> {
        let from = self.quarantine.path(location);
        let to = self.durable.path(location);

        let options = MoveOptions::new()
            .fallback(FallbackStrategy::Copy)
            .permissions(PermissionMode::File);
        match sift_fs::move_file(&from, &to, options)? {
            Moved::Renamed => {
                self.quarantine.prune(location);
                Ok(Persisted::Moved)
            }
            Moved::Copied => {
                let expected = self.quarantine.checksum(location)?;
                let actual = self.durable.checksum(location)?;
                if actual != expected {
                    self.durable.delete(location)?;
                    return Err(Error::ChecksumMismatch {
                        location: location.to_string(),
                        expected,
                        actual,
                    });
                }
                self.quarantine.delete(location)?;
                Ok(Persisted::Copied)
            }
        }
    }
}

impl StorageAdapter for Quarantine {
    fn put(&self, location: &Location, bytes: &[u8]) -> Result<u64> {
        self.live()?;
        self.quarantine.put(location, bytes)
    }

    fn put_file(&self, location: &Location, from: &Path) -> Result<u64> {
        self.live()?;
        self.quarantine.put_file(location, from)
    }

    fn get(&self, location: &Location) -> Result<Vec<u8>> {
        self.live()?;
        self.holder(location)?.get(location)
    }

    fn open(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        self.live()?;
        self.holder(location)?.open(location)
    }

    /// Keeps the file on the tier it is on.
    fn move_to(&self, from: &Location, to: &Location) -> Result<()> {
        self.live()?;
        let volume = self.holder(from)?;
        let other = if std::ptr::eq(volume, &self.quarantine) {
            &self.durable
        } else {
            &self.quarantine
        };
        other.delete(to)?;
        volume.rename(from, to)?;
        if self.durable.exists(from) {
            self.durable.delete(from)?;
        }
        Ok(())
    }

    fn copy(&self, from: &Location, to: &Location) -> Result<u64> {
        self.live()?;
        let bytes = self.holder(from)?.get(from)?;
        self.quarantine.put(to, &bytes)
    }

    fn delete(&self, location: &Location) -> Result<bool> {
        self.live()?;
        let quarantined = self.quarantine.delete(location)?;
        let durable = self.durable.delete(location)?;
        Ok(quarantined || durable)
    }

    fn checksum(&self, location: &Location) -> Result<String> {
        self.live()?;
        self.holder(location)?.checksum(location)
    }

    fn size(&self, location: &Location) -> Result<u64> {
        self.live()?;
        self.holder(location)?.size(location)
    }

    fn exists(&self, location: &Location) -> bool {
        self.live().is_ok() && self.holder(location).is_ok()
    }

    fn list(&self) -> Result<Vec<Location>> {
        self.live()?;
        let mut all = self.quarantine.list()?;
        all.extend(self.durable.list()?);
        all.sort();
        all.dedup();
        Ok(all)
    }

    fn persist(&self, location: &Location) -> Result<Persisted> {
        self.live()?;
        if self.quarantine.exists(location) {
            let outcome = self.promote(location)?;
            tracing::debug!(%location, ?outcome, "persisted");
            Ok(outcome)
        } else if self.durable.exists(location) {
            Ok(Persisted::AlreadyDurable)
        } else {
            Err(Error::NotFound(location.to_string()))
        }
    }

    fn is_persisted(&self, location: &Location) -> bool {
        self.live().is_ok() && !self.quarantine.exists(location) && self.durable.exists(location)
    }

    fn scratch_dir(&self) -> Result<Staging> {
        self.live()?;
        Ok(Staging::new_in(self.ephemeral_root.join("scratch"))?)
    }

    fn purge(&self) -> Result<()> {
        self.purged.store(true, Ordering::Release);
        sift_fs::remove_dir_all_if_exists(&self.ephemeral_root)?;
        sift_fs::remove_dir_all_if_exists(&self.durable_root)?;
        tracing::info!(
            ephemeral = %self.ephemeral_root.display(),
            durable = %self.durable_root.display(),
            "purged storage"
        );
        Ok(())
    }
}
