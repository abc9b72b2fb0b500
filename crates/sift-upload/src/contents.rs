use std::path::Path;

use sift_store::StorageAdapter;

use crate::file_type::{FileType, SourceType};
use crate::index::FileIndex;
use crate::log::{LogCode, LogEntry, Severity};
use crate::record::{FileKey, FileRecord, Namespace};

/// Everything a workspace knows about its files, minus the bytes.
///
/// All file mutations go through here so that storage, index and log never
/// disagree: content is written or moved first, and the index changes only
/// once storage has succeeded.
#[derive(Debug, Default)]
pub(crate) struct Contents {
    pub index: FileIndex,
    /// Every entry ever produced, in order.
    pub log: Vec<LogEntry>,
    /// Workspace-level entries produced by the latest mutating call.
    pub notices: Vec<LogEntry>,
    pub source_type: SourceType,
}

/// Bytes for a new file.
pub(crate) enum Content<'a> {
    Bytes(&'a [u8]),
    /// A file in a scratch directory, moved into storage.
    Scratch(&'a Path),
}

type StoreResult<T> = sift_store::Result<T>;

impl Contents {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            index: FileIndex::new(case_insensitive),
            ..Self::default()
        }
    }

    pub fn log_file(&mut self, key: &FileKey, entry: LogEntry) {
        let entry = entry.with_path(key.qualified());
        if let Some(record) = self.index.get_mut(key) {
            record.log.push(entry.clone());
        }
        self.log.push(entry);
    }

    pub fn log_workspace(&mut self, entry: LogEntry) {
        self.notices.push(entry.clone());
        self.log.push(entry);
    }

    /// Stores a new file under `wanted`, or under the first free `_N`
    /// variant of it with a collision warning.
    pub fn add(
        &mut self,
        storage: &dyn StorageAdapter,
        wanted: FileKey,
        content: Content<'_>,
    ) -> StoreResult<FileKey> {
        let key = self.index.free_key(wanted.clone());
        let location = key.location()?;
        let size = match content {
            Content::Bytes(bytes) => storage.put(&location, bytes)?,
            Content::Scratch(path) => storage.put_file(&location, path)?,
        };
        let checksum = storage.checksum(&location)?;

        self.index.insert(FileRecord::new(key.clone(), size, checksum));
        tracing::debug!(path = %key, size, "added file");

        if key != wanted {
            self.log_file(
                &key,
                LogEntry::new(
                    Severity::Warn,
                    LogCode::PathCollision,
                    format!("'{wanted}' already exists, stored as '{key}'"),
                ),
            );
        }
        Ok(key)
    }

    /// Moves a record to `wanted`, disambiguating as [`Contents::add`] does.
    pub fn rename(
        &mut self,
        storage: &dyn StorageAdapter,
        from: &FileKey,
        wanted: FileKey,
    ) -> StoreResult<FileKey> {
        if *from == wanted {
            return Ok(wanted);
        }
        let key = self.index.free_key(wanted.clone());
        storage.move_to(&from.location()?, &key.location()?)?;
        self.index.rekey(from, key.clone());
        tracing::debug!(from = %from, to = %key, "renamed file");

        if key != wanted {
            self.log_file(
                &key,
                LogEntry::new(
                    Severity::Warn,
                    LogCode::PathCollision,
                    format!("'{wanted}' already exists, renamed '{from}' to '{key}'"),
                ),
            );
        }
        Ok(key)
    }

    /// Soft-deletes a file into the removed namespace, keeping its record and
    /// content for audit.
    pub fn remove(&mut self, storage: &dyn StorageAdapter, key: &FileKey) -> StoreResult<FileKey> {
        if key.namespace == Namespace::Removed {
            return Ok(key.clone());
        }
        let target = self
            .index
            .free_key(FileKey::new(Namespace::Removed, key.qualified()));
        storage.move_to(&key.location()?, &target.location()?)?;
        self.index.rekey(key, target.clone());
        tracing::debug!(path = %key, "removed file");
        Ok(target)
    }

    /// Replaces the content of an existing file.
    pub fn replace(
        &mut self,
        storage: &dyn StorageAdapter,
        key: &FileKey,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let location = key.location()?;
        let size = storage.put(&location, bytes)?;
        let checksum = storage.checksum(&location)?;
        if let Some(record) = self.index.get_mut(key) {
            record.size = size;
            record.checksum = checksum;
            record.flags.is_persisted = false;
        }
        self.index.mark_dirty();
        Ok(())
    }

    pub fn set_type(&mut self, key: &FileKey, file_type: FileType) {
        if let Some(record) = self.index.get_mut(key) {
            record.file_type = file_type;
            record.sync_flags();
        }
    }

    /// Whether anything still blocks the workspace from being consumed.
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(LogEntry::is_error)
            || self
                .index
                .active()
                .any(|r| r.log.iter().any(LogEntry::is_error))
    }

    pub fn has_warnings(&self) -> bool {
        self.notices.iter().any(LogEntry::is_warning)
            || self
                .index
                .active()
                .any(|r| r.log.iter().any(LogEntry::is_warning))
    }
}
