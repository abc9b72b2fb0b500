use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sift_archive::{DiagnosticCode, UnpackOptions, UnpackReport};
use sift_store::{Persisted, StorageAdapter};

use crate::check::{CheckContext, CheckSettings, CheckerSet};
use crate::config::Config;
use crate::contents::{Content, Contents};
use crate::error::{Error, Result};
use crate::file_type::{FileType, SourceType};
use crate::index::FileIndex;
use crate::log::{LogCode, LogEntry, Severity};
use crate::metadata::WorkspaceState;
use crate::package::{package_checksum, write_package};
use crate::record::{FileKey, FileRecord, Namespace};
use crate::strategy::{CheckingStrategy, PassSummary, Sequential};

/// Lifecycle of a workspace.
///
/// `Active` and `Locked` switch back and forth. `Released` and `Purged` are
/// terminal; only a released workspace can still be read, persisted or
/// purged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Locked,
    Released,
    Purged,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Locked => "locked",
            Self::Released => "released",
            Self::Purged => "purged",
        })
    }
}

/// Who is calling. Only admins may lock and unlock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    ReadyWithWarnings,
    Errors,
}

/// An uploaded file: an archive to unpack or a loose file.
#[derive(Clone, Debug)]
pub struct Payload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// What a mutating call changed.
///
/// Entries are grouped by the path they were logged against, which for a
/// file renamed later in the same call is its path at logging time.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Outcome {
    /// Qualified paths of files that are new and still active.
    pub added: Vec<String>,
    pub files: IndexMap<String, Vec<LogEntry>>,
    pub workspace: Vec<LogEntry>,
    #[serde(skip)]
    pub summary: PassSummary,
}

impl Outcome {
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.files.values().flatten().chain(&self.workspace)
    }

    pub fn has_errors(&self) -> bool {
        self.entries().any(LogEntry::is_error)
    }
}

/// Point-in-time view of a workspace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkspaceStatus {
    pub id: String,
    pub status: Status,
    pub locked: bool,
    pub readiness: Readiness,
    pub source_type: SourceType,
    pub source_files: usize,
    pub ancillary_files: usize,
    pub removed_files: usize,
    /// Combined size of source and ancillary files.
    pub total_bytes: u64,
    pub checksum: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// An upload in progress: its files, their log, and the storage holding them.
///
/// Every mutating call unpacks or edits files, runs the checkers over whatever
/// changed, and refreshes the package checksum before returning.
pub struct Workspace {
    id: String,
    status: Status,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    checksum: String,
    contents: Contents,
    storage: Box<dyn StorageAdapter>,
    checkers: Arc<CheckerSet>,
    strategy: Box<dyn CheckingStrategy>,
    settings: CheckSettings,
    unpack: UnpackOptions,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("files", &self.contents.index.len())
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Creates an empty workspace with storage chosen by `config`.
    pub fn create(id: impl Into<String>, config: &Config) -> Result<Self> {
        let id = id.into();
        let storage = config.storage.open(&id)?;
        Ok(Self::with_storage(id, storage, config))
    }

    pub fn with_storage(
        id: impl Into<String>,
        storage: Box<dyn StorageAdapter>,
        config: &Config,
    ) -> Self {
        let workspace = Self::assemble(id.into(), storage, config);
        tracing::info!(id = %workspace.id, "created workspace");
        workspace
    }

    fn assemble(id: String, storage: Box<dyn StorageAdapter>, config: &Config) -> Self {
        let now = Utc::now();
        let contents = Contents::new(config.case_insensitive);
        Self {
            id,
            status: Status::Active,
            created: now,
            modified: now,
            checksum: package_checksum(contents.index.active()),
            contents,
            storage,
            checkers: Arc::new(CheckerSet::builtin()),
            strategy: Box::new(Sequential::new(config.max_passes)),
            settings: config.check_settings(),
            unpack: config.unpack_options(),
        }
    }

    /// Rebuilds a workspace from saved metadata over its existing storage.
    pub fn restore(state: WorkspaceState, config: &Config) -> Result<Self> {
        let storage = config.storage.open(&state.id)?;
        let mut workspace = Self::assemble(state.id, storage, config);
        workspace.status = state.status;
        workspace.created = state.created;
        workspace.modified = state.modified;
        workspace.checksum = state.checksum;
        workspace.contents.index = FileIndex::from_records(state.files, config.case_insensitive);
        workspace.contents.log = state.log;
        workspace.contents.notices = state.notices;
        workspace.contents.source_type = state.source_type;
        tracing::debug!(id = %workspace.id, files = workspace.contents.index.len(), "restored workspace");
        Ok(workspace)
    }

    pub fn with_checkers(mut self, checkers: Arc<CheckerSet>) -> Self {
        self.checkers = checkers;
        self
    }

    pub fn with_strategy(mut self, strategy: impl CheckingStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> WorkspaceState {
        WorkspaceState {
            id: self.id.clone(),
            status: self.status,
            locked: self.status == Status::Locked,
            created: self.created,
            modified: self.modified,
            checksum: self.checksum.clone(),
            source_type: self.contents.source_type,
            log: self.contents.log.clone(),
            notices: self.contents.notices.clone(),
            files: self.contents.index.iter().cloned().collect(),
        }
    }

    /// Unpacks an archive, or stores a loose file, and checks the result.
    pub fn add_files(&mut self, payload: Payload) -> Result<Outcome> {
        self.mutate("add files", |ws| ws.ingest(payload))
    }

    /// Stores one file as is, without looking for an archive.
    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> Result<Outcome> {
        self.mutate("add a file", |ws| ws.add_loose(name, Content::Bytes(bytes)).map(drop))
    }

    /// Moves a file to the removed namespace.
    pub fn remove_file(&mut self, path: &str) -> Result<Outcome> {
        self.mutate("remove a file", |ws| {
            let key = ws.resolve(path)?;
            ws.contents.log_file(
                &key,
                LogEntry::new(Severity::Info, LogCode::FileRemoved, format!("Removed '{key}'.")),
            );
            ws.contents.remove(ws.storage.as_ref(), &key)?;
            Ok(())
        })
    }

    /// Replaces a file's content. The file is checked again from scratch,
    /// and entries about its old content no longer count.
    pub fn replace_file(&mut self, path: &str, bytes: &[u8]) -> Result<Outcome> {
        self.mutate("replace a file", |ws| {
            let key = ws.resolve(path)?;
            ws.contents.replace(ws.storage.as_ref(), &key, bytes)?;
            ws.contents.set_type(&key, FileType::Unknown);
            if let Some(record) = ws.contents.index.get_mut(&key) {
                record.flags.is_checked = false;
                record.log.clear();
            }
            ws.contents.log_file(
                &key,
                LogEntry::new(
                    Severity::Info,
                    LogCode::FileReplaced,
                    format!("Replaced '{key}' ({} bytes).", bytes.len()),
                ),
            );
            Ok(())
        })
    }

    /// Moves every active file to the removed namespace.
    pub fn remove_all(&mut self) -> Result<Outcome> {
        self.mutate("remove all files", |ws| {
            let keys: Vec<FileKey> = ws.contents.index.active().map(FileRecord::key).collect();
            for key in &keys {
                ws.contents.remove(ws.storage.as_ref(), key)?;
            }
            ws.contents.log_workspace(LogEntry::new(
                Severity::Info,
                LogCode::FileRemoved,
                format!("Removed all {} files.", keys.len()),
            ));
            Ok(())
        })
    }

    /// Whether the workspace can be consumed as it stands.
    ///
    /// A workspace has errors when an active file or the latest call's
    /// workspace checks logged one, when there is no source file, or when its
    /// source type is invalid.
    pub fn readiness(&self) -> Readiness {
        let no_source = self.contents.index.in_namespace(Namespace::Source).next().is_none();
        if self.contents.has_errors()
            || no_source
            || self.contents.source_type == SourceType::Invalid
        {
            Readiness::Errors
        } else if self.contents.has_warnings() {
            Readiness::ReadyWithWarnings
        } else {
            Readiness::Ready
        }
    }

    /// Moves every checked, active file to durable storage. Returns how many
    /// files were moved; calling it again moves nothing.
    pub fn persist(&mut self) -> Result<usize> {
        self.ensure_not(&[Status::Purged], "persist")?;
        let keys: Vec<FileKey> = self
            .contents
            .index
            .active()
            .filter(|r| r.flags.is_checked && !r.flags.is_persisted)
            .map(FileRecord::key)
            .collect();

        let mut moved = 0;
        for key in &keys {
            if self.persist_key(key)? != Persisted::AlreadyDurable {
                moved += 1;
            }
        }
        if !keys.is_empty() {
            self.modified = Utc::now();
        }
        tracing::info!(id = %self.id, files = keys.len(), moved, "persisted workspace");
        Ok(moved)
    }

    pub fn persist_file(&mut self, path: &str) -> Result<Persisted> {
        self.ensure_not(&[Status::Purged], "persist")?;
        let key = self.resolve(path)?;
        let persisted = self.persist_key(&key)?;
        self.modified = Utc::now();
        Ok(persisted)
    }

    /// Ends the upload. Files are kept but can no longer change.
    pub fn release(&mut self) -> Result<()> {
        self.ensure_not(&[Status::Released, Status::Purged], "release")?;
        self.status = Status::Released;
        self.modified = Utc::now();
        tracing::info!(id = %self.id, "released workspace");
        Ok(())
    }

    /// Deletes all content. The workspace cannot be used afterwards.
    pub fn purge(&mut self) -> Result<()> {
        if self.status == Status::Purged {
            return Ok(());
        }
        self.storage.purge()?;
        self.contents.index.clear();
        self.contents.notices.clear();
        self.status = Status::Purged;
        self.checksum = package_checksum(self.contents.index.active());
        self.modified = Utc::now();
        tracing::info!(id = %self.id, "purged workspace");
        Ok(())
    }

    pub fn lock(&mut self, capability: Capability) -> Result<()> {
        self.set_locked(capability, true)
    }

    pub fn unlock(&mut self, capability: Capability) -> Result<()> {
        self.set_locked(capability, false)
    }

    /// Every record, removed ones included, in index order.
    pub fn list_files(&self) -> Vec<FileRecord> {
        self.contents.index.iter().cloned().collect()
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        let key = self.contents.index.resolve(path)?;
        self.contents.index.get(&key)
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_not(&[Status::Purged], "read files")?;
        let key = self.resolve(path)?;
        Ok(self.storage.get(&key.location()?)?)
    }

    pub fn status(&self) -> WorkspaceStatus {
        let count = |namespace| self.contents.index.in_namespace(namespace).count();
        WorkspaceStatus {
            id: self.id.clone(),
            status: self.status,
            locked: self.status == Status::Locked,
            readiness: self.readiness(),
            source_type: self.contents.source_type,
            source_files: count(Namespace::Source),
            ancillary_files: count(Namespace::Ancillary),
            removed_files: count(Namespace::Removed),
            total_bytes: self.contents.index.active().map(|r| r.size).sum(),
            checksum: self.checksum.clone(),
            created: self.created,
            modified: self.modified,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.contents.source_type
    }

    /// Every entry ever logged, in order.
    pub fn log(&self) -> &[LogEntry] {
        &self.contents.log
    }

    /// Workspace-level entries from the latest mutating call.
    pub fn notices(&self) -> &[LogEntry] {
        &self.contents.notices
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// A gzipped tarball of the active files. See [`crate::package`].
    pub fn get_package(&self) -> Result<Vec<u8>> {
        self.ensure_not(&[Status::Purged], "build a package")?;
        write_package(self.storage.as_ref(), self.contents.index.active(), Vec::new())
    }

    fn set_locked(&mut self, capability: Capability, locked: bool) -> Result<()> {
        if capability != Capability::Admin {
            return Err(Error::PermissionDenied("admin"));
        }
        let operation = if locked { "lock" } else { "unlock" };
        self.ensure_not(&[Status::Released, Status::Purged], operation)?;
        let status = if locked { Status::Locked } else { Status::Active };
        if self.status != status {
            self.status = status;
            self.modified = Utc::now();
            tracing::info!(id = %self.id, %status, "changed lock");
        }
        Ok(())
    }

    fn ensure_not(&self, statuses: &[Status], operation: &'static str) -> Result<()> {
        if statuses.contains(&self.status) {
            return Err(Error::InvalidState {
                id: self.id.clone(),
                status: self.status,
                operation,
            });
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<FileKey> {
        self.contents
            .index
            .resolve(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    fn persist_key(&mut self, key: &FileKey) -> Result<Persisted> {
        let persisted = self.storage.persist(&key.location()?)?;
        if let Some(record) = self.contents.index.get_mut(key) {
            record.flags.is_persisted = true;
        }
        Ok(persisted)
    }

    /// Runs `apply`, then the checkers, and reports what the call logged.
    ///
    /// Workspace-level entries are regenerated on every call. When `apply`
    /// fails partway, whatever it stored stays in the index unchecked and is
    /// checked by the next call.
    fn mutate(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<Outcome> {
        if self.status == Status::Locked {
            return Err(Error::WorkspaceLocked(self.id.clone()));
        }
        self.ensure_not(&[Status::Released, Status::Purged], operation)?;

        let before: HashSet<FileKey> = self.contents.index.iter().map(FileRecord::key).collect();
        let log_start = self.contents.log.len();
        self.contents.notices.clear();
        self.contents.index.mark_dirty();

        let result = apply(self).and_then(|()| self.run_checks());
        self.checksum = package_checksum(self.contents.index.active());
        self.modified = Utc::now();
        let summary = result?;

        let mut outcome = Outcome {
            added: self
                .contents
                .index
                .active()
                .filter(|r| !before.contains(&r.key()))
                .map(FileRecord::qualified_path)
                .collect(),
            summary,
            ..Outcome::default()
        };
        for entry in &self.contents.log[log_start..] {
            match &entry.path {
                Some(path) => outcome.files.entry(path.clone()).or_default().push(entry.clone()),
                None => outcome.workspace.push(entry.clone()),
            }
        }
        tracing::info!(
            id = %self.id,
            operation,
            added = outcome.added.len(),
            entries = log_start.abs_diff(self.contents.log.len()),
            readiness = ?self.readiness(),
            "workspace updated"
        );
        Ok(outcome)
    }

    fn run_checks(&mut self) -> Result<PassSummary> {
        let mut ctx = CheckContext::new(&mut self.contents, self.storage.as_ref(), &self.settings);
        Ok(self.strategy.apply(&mut ctx, &self.checkers)?)
    }

    fn ingest(&mut self, payload: Payload) -> Result<()> {
        let scratch = self.storage.scratch_dir()?;
        let spool = scratch.path().join("payload");
        sift_fs::atomic_write(&spool, &payload.bytes, sift_fs::AtomicWriteOptions::new())?;

        if sift_archive::detect_path(&spool)?.is_none() {
            return self.add_loose(&payload.name, Content::Scratch(&spool)).map(drop);
        }
        let unpacked = scratch.path().join("unpacked");
        let report = match sift_archive::unpack_path(&spool, &unpacked, &self.unpack) {
            Ok(report) => report,
            Err(sift_archive::Error::Corrupted(reason)) => {
                tracing::warn!(name = %payload.name, %reason, "unreadable archive kept as is");
                let key = self.add_loose(&payload.name, Content::Scratch(&spool))?;
                self.contents.log_file(
                    &key,
                    LogEntry::new(
                        Severity::Error,
                        LogCode::ArchiveCorrupt,
                        format!("Could not unpack '{}': {reason}.", payload.name),
                    ),
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(
            name = %payload.name,
            format = ?report.format,
            files = report.files.len(),
            "unpacked payload"
        );
        self.store_unpacked(&payload.name, report)
    }

    /// Moves unpacked files into storage and files each diagnostic under the
    /// record it is about. Damage to the archive itself is a workspace notice
    /// against the payload name.
    fn store_unpacked(&mut self, name: &str, report: UnpackReport) -> Result<()> {
        let mut stored: IndexMap<&str, FileKey> = IndexMap::new();
        for file in &report.files {
            let key = self.contents.add(
                self.storage.as_ref(),
                FileKey::source(file.path.as_str()),
                Content::Scratch(&file.location),
            )?;
            stored.insert(file.path.as_str(), key);
        }

        for diagnostic in &report.diagnostics {
            let entry = LogEntry::from(diagnostic);
            if diagnostic.code == DiagnosticCode::ArchiveCorrupt {
                self.contents.log_workspace(entry.with_path(name));
                continue;
            }
            match diagnostic.path.as_deref().and_then(|path| stored.get(path)) {
                Some(key) => self.contents.log_file(key, entry),
                None if entry.path.is_some() => self.contents.log.push(entry),
                None => self.contents.log_workspace(entry),
            }
        }
        Ok(())
    }

    fn add_loose(&mut self, name: &str, content: Content<'_>) -> Result<FileKey> {
        let sanitized = sift_archive::sanitize(name)?;
        let key = self.contents.add(
            self.storage.as_ref(),
            FileKey::source(sanitized.path.as_str()),
            content,
        )?;
        for warning in sanitized.warnings {
            self.contents.log_file(
                &key,
                LogEntry::new(Severity::Warn, warning.code.into(), warning.message),
            );
        }
        self.contents.log_file(
            &key,
            LogEntry::new(Severity::Info, LogCode::FileAdded, format!("Added '{key}'.")),
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_store::SingleVolume;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SingleVolume::new(dir.path().join("ws")).unwrap();
        let ws = Workspace::with_storage("w1", Box::new(storage), &Config::default());
        (dir, ws)
    }

    const PAPER: &[u8] = b"\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n";

    #[test]
    fn loose_tex_file_is_ready() {
        let (_dir, mut ws) = workspace();
        let outcome = ws.add_file("paper.tex", PAPER).unwrap();

        assert_eq!(outcome.added, ["paper.tex"]);
        assert!(!outcome.has_errors());
        assert_eq!(ws.source_type(), SourceType::Tex);
        assert_eq!(ws.readiness(), Readiness::Ready);
        let record = ws.file("paper.tex").unwrap();
        assert!(record.flags.is_checked);
        assert_eq!(record.file_type, FileType::Latex2e);
    }

    #[test]
    fn empty_workspace_is_not_ready() {
        let (_dir, ws) = workspace();
        assert_eq!(ws.readiness(), Readiness::Errors);
        assert_eq!(ws.status().source_files, 0);
    }

    #[test]
    fn loose_file_name_is_sanitized() {
        let (_dir, mut ws) = workspace();
        let outcome = ws.add_file("C:\\work\\paper.tex", PAPER).unwrap();

        assert_eq!(outcome.added, ["work/paper.tex"]);
        let entries = &outcome.files["work/paper.tex"];
        assert!(entries.iter().any(|e| e.code == LogCode::AbsolutePath));
    }

    #[test]
    fn remove_and_replace() {
        let (_dir, mut ws) = workspace();
        ws.add_file("paper.tex", PAPER).unwrap();
        ws.add_file("fig.pdf", b"%PDF-1.4\ntruncated\n").unwrap();
        assert_eq!(ws.readiness(), Readiness::Errors);

        let outcome = ws
            .replace_file("fig.pdf", b"%PDF-1.4\nbody\n%%EOF\n")
            .unwrap();
        assert!(!outcome.has_errors());
        assert_eq!(ws.file("fig.pdf").unwrap().file_type, FileType::Pdf);
        assert_eq!(ws.readiness(), Readiness::Ready);

        ws.remove_file("fig.pdf").unwrap();
        assert!(ws.file("fig.pdf").is_none());
        assert_eq!(ws.status().removed_files, 1);
        assert!(matches!(ws.remove_file("fig.pdf"), Err(Error::NotFound(_))));
    }

    #[test]
    fn remove_all_leaves_nothing_active() {
        let (_dir, mut ws) = workspace();
        ws.add_file("a.tex", PAPER).unwrap();
        ws.add_file("b.tex", PAPER).unwrap();
        ws.remove_all().unwrap();

        assert_eq!(ws.status().removed_files, 2);
        assert_eq!(ws.source_type(), SourceType::Invalid);
        assert_eq!(ws.readiness(), Readiness::Errors);
    }

    #[test]
    fn checksum_follows_content() {
        let (_dir, mut ws) = workspace();
        let empty = ws.checksum().to_string();
        ws.add_file("a.tex", PAPER).unwrap();
        let one = ws.checksum().to_string();
        assert_ne!(empty, one);

        ws.replace_file("a.tex", b"\\documentclass{book}\n").unwrap();
        assert_ne!(ws.checksum(), one);
    }

    #[test]
    fn locking_requires_admin_and_blocks_mutation() {
        let (_dir, mut ws) = workspace();
        assert!(matches!(ws.lock(Capability::User), Err(Error::PermissionDenied(_))));

        ws.lock(Capability::Admin).unwrap();
        ws.lock(Capability::Admin).unwrap();
        assert!(ws.status().locked);
        assert!(matches!(ws.add_file("a.tex", PAPER), Err(Error::WorkspaceLocked(_))));

        ws.unlock(Capability::Admin).unwrap();
        ws.add_file("a.tex", PAPER).unwrap();
    }

    #[test]
    fn released_workspace_is_read_only() {
        let (_dir, mut ws) = workspace();
        ws.add_file("a.tex", PAPER).unwrap();
        ws.release().unwrap();

        assert!(matches!(
            ws.add_file("b.tex", PAPER),
            Err(Error::InvalidState { status: Status::Released, .. })
        ));
        assert!(ws.get_package().is_ok());
        assert_eq!(ws.read_file("a.tex").unwrap(), PAPER);
    }

    #[test]
    fn purge_is_terminal() {
        let (_dir, mut ws) = workspace();
        ws.add_file("a.tex", PAPER).unwrap();
        ws.purge().unwrap();
        ws.purge().unwrap();

        assert_eq!(ws.status().status, Status::Purged);
        assert!(ws.list_files().is_empty());
        assert!(ws.get_package().is_err());
        assert!(ws.lock(Capability::Admin).is_err());
    }

    #[test]
    fn persist_is_idempotent() {
        let (_dir, mut ws) = workspace();
        ws.add_file("a.tex", PAPER).unwrap();
        let checksum = ws.checksum().to_string();

        ws.persist().unwrap();
        assert!(ws.file("a.tex").unwrap().flags.is_persisted);
        assert_eq!(ws.persist().unwrap(), 0);
        assert_eq!(ws.checksum(), checksum);
        assert_eq!(ws.persist_file("a.tex").unwrap(), Persisted::AlreadyDurable);
    }

    #[test]
    fn state_round_trips_through_restore() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: sift_store::StorageConfig::Single {
                root: dir.path().to_path_buf(),
            },
            ..Config::default()
        };
        let mut ws = Workspace::create("w2", &config).unwrap();
        ws.add_file("a.tex", PAPER).unwrap();
        ws.add_file("b.pdf", b"%PDF-1.4\n").unwrap();
        let state = ws.state();
        drop(ws);

        let restored = Workspace::restore(state.clone(), &config).unwrap();
        assert_eq!(restored.state(), state);
        assert_eq!(restored.readiness(), Readiness::Errors);
        assert_eq!(restored.read_file("a.tex").unwrap(), PAPER);
    }
}
