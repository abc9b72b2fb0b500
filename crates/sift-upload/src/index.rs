use std::collections::HashSet;

use indexmap::IndexMap;
use sift_archive::{disambiguate, fold_case};

use crate::record::{FileKey, FileRecord, Namespace};

/// Ordered map of every file in a workspace, keyed by namespace and path.
///
/// Insertion order is preserved across renames. When the index is
/// case-insensitive, two paths in the same namespace that differ only by case
/// count as the same key for collision purposes.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    records: IndexMap<FileKey, FileRecord>,
    folded: HashSet<FileKey>,
    case_insensitive: bool,
    dirty: bool,
}

impl FileIndex {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ..Self::default()
        }
    }

    pub fn from_records(
        records: impl IntoIterator<Item = FileRecord>,
        case_insensitive: bool,
    ) -> Self {
        let mut index = Self::new(case_insensitive);
        for record in records {
            let key = index.free_key(record.key());
            let mut record = record;
            record.path = key.path;
            index.insert(record);
        }
        index.dirty = false;
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &FileKey) -> Option<&FileRecord> {
        self.records.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &FileKey) -> Option<&mut FileRecord> {
        self.records.get_mut(key)
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.records.contains_key(key)
    }

    /// Whether `key` collides with an existing record.
    pub fn is_taken(&self, key: &FileKey) -> bool {
        self.folded.contains(&self.fold(key))
    }

    /// `key` itself if free, otherwise the first free `_N` variant of it.
    pub fn free_key(&self, key: FileKey) -> FileKey {
        let namespace = key.namespace;
        let path = disambiguate(&key.path, |candidate| {
            self.is_taken(&FileKey::new(namespace, candidate))
        });
        FileKey::new(namespace, path)
    }

    /// Adds a record whose key must be free. Returns `false` and leaves the
    /// index untouched when it is not.
    pub(crate) fn insert(&mut self, mut record: FileRecord) -> bool {
        let key = record.key();
        if self.is_taken(&key) {
            return false;
        }
        record.sync_flags();
        let folded = self.fold(&key);
        self.folded.insert(folded);
        self.records.insert(key, record);
        self.dirty = true;
        true
    }

    /// Moves the record at `from` to `to`, keeping its position.
    pub(crate) fn rekey(&mut self, from: &FileKey, to: FileKey) -> Option<&mut FileRecord> {
        let (position, _, mut record) = self.records.shift_remove_full(from)?;
        let old = self.fold(from);
        self.folded.remove(&old);

        record.path = to.path.clone();
        record.namespace = to.namespace;
        record.sync_flags();

        let new = self.fold(&to);
        self.folded.insert(new);
        self.records.shift_insert(position, to.clone(), record);
        self.dirty = true;
        self.records.get_mut(&to)
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.folded.clear();
        self.dirty = true;
    }

    /// Finds the active record for a qualified path (`anc/` for ancillary).
    pub fn resolve(&self, qualified: &str) -> Option<FileKey> {
        if let Some(rest) = qualified.strip_prefix(Namespace::Ancillary.prefix()) {
            let key = FileKey::new(Namespace::Ancillary, rest);
            if self.contains(&key) {
                return Some(key);
            }
        }
        let key = FileKey::source(qualified);
        self.contains(&key).then_some(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Source and ancillary files, in index order.
    pub fn active(&self) -> impl Iterator<Item = &FileRecord> {
        self.iter().filter(|r| r.is_active())
    }

    pub fn in_namespace(&self, namespace: Namespace) -> impl Iterator<Item = &FileRecord> {
        self.iter().filter(move |r| r.namespace == namespace)
    }

    /// Active files that still need checking, in index order.
    pub fn unchecked(&self) -> Vec<FileKey> {
        self.active()
            .filter(|r| !r.flags.is_checked)
            .map(FileRecord::key)
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn fold(&self, key: &FileKey) -> FileKey {
        FileKey::new(key.namespace, fold_case(&key.path, self.case_insensitive))
    }
}
