use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use sift_fs::Staging;

use crate::volume::Volume;
use crate::{Error, Location, Persisted, Result, StorageAdapter};

/// Everything on one volume. Files are durable as soon as they are written.
#[derive(Debug)]
pub struct SingleVolume {
    root: PathBuf,
    files: Volume,
    purged: AtomicBool,
}

impl SingleVolume {
    /// Files go under `root/files`, scratch space under `root/scratch`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let files = Volume::new(root.join("files"));
        sift_fs::ensure_dir(files.root())?;
        Ok(Self {
            root,
            files,
            purged: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn live(&self) -> Result<()> {
        if self.purged.load(Ordering::Acquire) {
            Err(Error::Purged)
        } else {
            Ok(())
        }
    }
}

impl StorageAdapter for SingleVolume {
    fn put(&self, location: &Location, bytes: &[u8]) -> Result<u64> {
        self.live()?;
        self.files.put(location, bytes)
    }

    fn put_file(&self, location: &Location, from: &Path) -> Result<u64> {
        self.live()?;
        self.files.put_file(location, from)
    }

    fn get(&self, location: &Location) -> Result<Vec<u8>> {
        self.live()?;
        self.files.get(location)
    }

    fn open(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        self.live()?;
        self.files.open(location)
    }

    fn move_to(&self, from: &Location, to: &Location) -> Result<()> {
        self.live()?;
        self.files.rename(from, to)
    }

    fn copy(&self, from: &Location, to: &Location) -> Result<u64> {
        self.live()?;
        self.files.copy(from, to)
    }

    fn delete(&self, location: &Location) -> Result<bool> {
        self.live()?;
        self.files.delete(location)
    }

    fn checksum(&self, location: &Location) -> Result<String> {
        self.live()?;
        self.files.checksum(location)
    }

    fn size(&self, location: &Location) -> Result<u64> {
        self.live()?;
        self.files.size(location)
    }

    fn exists(&self, location: &Location) -> bool {
        self.live().is_ok() && self.files.exists(location)
    }

    fn list(&self) -> Result<Vec<Location>> {
        self.live()?;
        self.files.list()
    }

    fn persist(&self, location: &Location) -> Result<Persisted> {
        self.live()?;
        if self.files.exists(location) {
            Ok(Persisted::AlreadyDurable)
        } else {
            Err(Error::NotFound(location.to_string()))
        }
    }

    fn is_persisted(&self, location: &Location) -> bool {
        self.exists(location)
    }

    fn scratch_dir(&self) -> Result<Staging> {
        self.live()?;
        Ok(Staging::new_in(self.root.join("scratch"))?)
    }

    fn purge(&self) -> Result<()> {
        self.purged.store(true, Ordering::Release);
        sift_fs::remove_dir_all_if_exists(&self.root)?;
        tracing::info!(root = %self.root.display(), "purged storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loc(s: &str) -> Location {
        Location::new(s).unwrap()
    }

    #[test]
    fn put_get_roundtrip_and_list() {
        let dir = tempdir().unwrap();
        let store = SingleVolume::new(dir.path().join("ws")).unwrap();

        store.put(&loc("b.tex"), b"b").unwrap();
        store.put(&loc("anc/a.csv"), b"a").unwrap();

        assert_eq!(store.get(&loc("b.tex")).unwrap(), b"b");
        assert_eq!(store.list().unwrap(), vec![loc("anc/a.csv"), loc("b.tex")]);
    }

    #[test]
    fn persist_is_already_durable() {
        let dir = tempdir().unwrap();
        let store = SingleVolume::new(dir.path()).unwrap();
        store.put(&loc("a.tex"), b"a").unwrap();

        assert_eq!(store.persist(&loc("a.tex")).unwrap(), Persisted::AlreadyDurable);
        assert_eq!(store.persist(&loc("a.tex")).unwrap(), Persisted::AlreadyDurable);
        assert!(store.is_persisted(&loc("a.tex")));
        assert!(matches!(store.persist(&loc("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn move_prunes_empty_directories() {
        let dir = tempdir().unwrap();
        let store = SingleVolume::new(dir.path()).unwrap();
        store.put(&loc("x/y/a.tex"), b"a").unwrap();

        store.move_to(&loc("x/y/a.tex"), &loc("removed/a.tex")).unwrap();

        assert!(!store.exists(&loc("x/y/a.tex")));
        assert!(!dir.path().join("files").join("x").exists());
        assert_eq!(store.get(&loc("removed/a.tex")).unwrap(), b"a");
    }

    #[test]
    fn purge_disables_storage() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ws");
        let store = SingleVolume::new(&root).unwrap();
        store.put(&loc("a.tex"), b"a").unwrap();

        store.purge().unwrap();

        assert!(!root.exists());
        assert!(matches!(store.get(&loc("a.tex")), Err(Error::Purged)));
        store.purge().unwrap();
    }
}
