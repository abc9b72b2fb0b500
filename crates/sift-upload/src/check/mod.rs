//! Checker framework and the built-in checkers.
//!
//! A [`Checker`] implements any of five hooks. [`CheckerSet`] holds checkers in
//! registration order together with the file types each one's typed hook
//! applies to, so dispatch is a set lookup. Checkers never touch storage or
//! the index directly; they act through [`CheckContext`].

use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use sift_store::StorageAdapter;

use crate::contents::{Content, Contents};
use crate::file_type::{FileType, SourceType};
use crate::index::FileIndex;
use crate::log::{LogCode, LogEntry, Severity};
use crate::record::{FileKey, FileRecord, Namespace};

mod cleanup;
mod file_names;
mod file_type;
mod images;
mod removal;
mod size;
mod source_type;
mod tex;
mod uuencoded;

pub use cleanup::{CheckPdf, CheckPostscript};
pub use file_names::{ReplaceIllegalCharacters, WarnAboutTexBackupFiles};
pub use file_type::{InferFileType, infer_file_type};
pub use images::StripTiffPreview;
pub use removal::{
    MarkAncillaryFiles, RemoveDisallowedFiles, RemoveHiddenFiles, RemoveMacOsxFiles,
    RemoveZeroLengthFiles, WarnAboutProcessedDirectory,
};
pub use size::{CheckFileSize, CheckPackageSize};
pub use source_type::InferSourceType;
pub use tex::{CheckBibWithoutBbl, DisallowDviFiles, FlagInvalidFileTypes, RemoveTexGeneratedFiles};
pub use uuencoded::DecodeUuencoded;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Skip the remaining hooks of this checker for this file.
    #[error("checker stopped")]
    Stop,

    #[error(transparent)]
    Storage(#[from] sift_store::Error),
}

pub type CheckResult<T = ()> = std::result::Result<T, CheckError>;

/// A rule applied to uploaded files.
///
/// For each unchecked file the hooks run in this order: [`Checker::check`],
/// [`Checker::check_tex_types`] for TeX-family files, [`Checker::check_typed`]
/// when the file's type is in [`Checker::file_types`], then
/// [`Checker::check_finally`]. A typed hook that changes the file's type to
/// another type it handles is called once more for the new type. Each file
/// goes through the chain once; later hooks see what earlier ones changed.
/// [`Checker::check_workspace`] runs once per pass after every file has been
/// checked.
#[allow(unused_variables)]
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;

    /// File types that [`Checker::check_typed`] applies to.
    fn file_types(&self) -> &[FileType] {
        &[]
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        Ok(())
    }

    fn check_tex_types(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        Ok(())
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        Ok(())
    }

    fn check_finally(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        Ok(())
    }

    fn check_workspace(&self, ctx: &mut CheckContext<'_>) -> CheckResult {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Hook {
    Check,
    TexTypes,
    Typed,
    Finally,
}

impl Hook {
    pub(crate) const FILE_HOOKS: [Hook; 4] = [Hook::Check, Hook::TexTypes, Hook::Typed, Hook::Finally];
}

struct Registered {
    checker: Box<dyn Checker>,
    types: HashSet<FileType>,
}

/// Checkers in registration order with their typed-hook dispatch table.
pub struct CheckerSet {
    checkers: Vec<Registered>,
}

impl CheckerSet {
    pub fn empty() -> Self {
        Self {
            checkers: Vec::new(),
        }
    }

    /// The built-in checkers in their default order.
    pub fn builtin() -> Self {
        Self::empty()
            .register(RemoveMacOsxFiles)
            .register(RemoveHiddenFiles)
            .register(RemoveZeroLengthFiles)
            .register(MarkAncillaryFiles)
            .register(WarnAboutProcessedDirectory)
            .register(WarnAboutTexBackupFiles)
            .register(ReplaceIllegalCharacters)
            .register(RemoveDisallowedFiles)
            .register(CheckBibWithoutBbl)
            .register(RemoveTexGeneratedFiles)
            .register(InferFileType)
            .register(DisallowDviFiles)
            .register(FlagInvalidFileTypes)
            .register(CheckPdf)
            .register(StripTiffPreview)
            .register(CheckPostscript)
            .register(DecodeUuencoded)
            .register(CheckFileSize)
            .register(CheckPackageSize)
            .register(InferSourceType)
    }

    pub fn register(mut self, checker: impl Checker + 'static) -> Self {
        let types = checker.file_types().iter().copied().collect();
        self.checkers.push(Registered {
            checker: Box::new(checker),
            types,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checkers.iter().map(|r| r.checker.name())
    }

    /// Runs one checker's hook chain on the current file of `ctx`.
    ///
    /// Returns `Ok(false)` once the file has been removed, after which no
    /// further checker should see it.
    pub(crate) fn run_file_hooks(&self, at: usize, ctx: &mut CheckContext<'_>) -> CheckResult<bool> {
        let registered = &self.checkers[at];
        for hook in Hook::FILE_HOOKS {
            let Some(file) = ctx.file().filter(|f| f.is_active()).cloned() else {
                return Ok(false);
            };
            let checker = registered.checker.as_ref();
            let result = match hook {
                Hook::Check => checker.check(ctx, &file),
                Hook::TexTypes if file.file_type.is_tex_type() => checker.check_tex_types(ctx, &file),
                Hook::Typed if registered.types.contains(&file.file_type) => {
                    run_typed(registered, ctx, &file)
                }
                Hook::Finally => checker.check_finally(ctx, &file),
                Hook::TexTypes | Hook::Typed => Ok(()),
            };
            match result {
                Ok(()) => {}
                Err(CheckError::Stop) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(ctx.file().is_some_and(FileRecord::is_active))
    }

    pub(crate) fn run_workspace_hook(&self, at: usize, ctx: &mut CheckContext<'_>) -> CheckResult {
        match self.checkers[at].checker.check_workspace(ctx) {
            Err(CheckError::Stop) => Ok(()),
            other => other,
        }
    }
}

fn run_typed(registered: &Registered, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
    registered.checker.check_typed(ctx, file)?;
    let retyped = ctx
        .file()
        .filter(|f| {
            f.is_active() && f.file_type != file.file_type && registered.types.contains(&f.file_type)
        })
        .cloned();
    match retyped {
        Some(retyped) => registered.checker.check_typed(ctx, &retyped),
        None => Ok(()),
    }
}

impl Default for CheckerSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for CheckerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Limits checkers enforce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckSettings {
    pub max_file_bytes: u64,
    pub max_package_bytes: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        crate::Config::default().check_settings()
    }
}

/// The mutation API checkers act through.
///
/// During file hooks the context has a current file, which the file-scoped
/// methods operate on. Renames and removals keep the current file pointing at
/// the moved record.
pub struct CheckContext<'a> {
    contents: &'a mut Contents,
    storage: &'a dyn StorageAdapter,
    settings: &'a CheckSettings,
    current: Option<FileKey>,
}

impl<'a> CheckContext<'a> {
    pub(crate) fn new(
        contents: &'a mut Contents,
        storage: &'a dyn StorageAdapter,
        settings: &'a CheckSettings,
    ) -> Self {
        Self {
            contents,
            storage,
            settings,
            current: None,
        }
    }

    pub(crate) fn begin_file(&mut self, key: FileKey) {
        self.current = Some(key);
    }

    pub(crate) fn finish_file(&mut self) {
        if let Some(key) = self.current.take() {
            if let Some(record) = self.contents.index.get_mut(&key) {
                record.flags.is_checked = true;
            }
        }
    }

    pub(crate) fn contents_mut(&mut self) -> &mut Contents {
        self.contents
    }

    pub fn index(&self) -> &FileIndex {
        &self.contents.index
    }

    pub fn settings(&self) -> &CheckSettings {
        self.settings
    }

    pub fn source_type(&self) -> SourceType {
        self.contents.source_type
    }

    pub fn set_source_type(&mut self, source_type: SourceType) {
        self.contents.source_type = source_type;
    }

    /// The current file, if there is one.
    pub fn file(&self) -> Option<&FileRecord> {
        self.current.as_ref().and_then(|k| self.contents.index.get(k))
    }

    /// Whether an active file exists at `path` in `namespace`.
    pub fn exists(&self, namespace: Namespace, path: &str) -> bool {
        self.contents.index.contains(&FileKey::new(namespace, path))
    }

    pub fn read(&self) -> CheckResult<Vec<u8>> {
        let key = self.current_key()?;
        Ok(self.storage.get(&key.location()?)?)
    }

    /// Up to `limit` leading bytes of the current file.
    pub fn read_head(&self, limit: u64) -> CheckResult<Vec<u8>> {
        let key = self.current_key()?;
        let reader = self.storage.open(&key.location()?)?;
        let mut head = Vec::new();
        reader
            .take(limit)
            .read_to_end(&mut head)
            .map_err(|e| sift_store::Error::Io {
                path: key.qualified().into(),
                source: e,
            })?;
        Ok(head)
    }

    pub fn log(&mut self, severity: Severity, code: LogCode, message: impl Into<String>) {
        if let Some(key) = self.current.clone() {
            self.contents
                .log_file(&key, LogEntry::new(severity, code, message));
        }
    }

    pub fn info(&mut self, code: LogCode, message: impl Into<String>) {
        self.log(Severity::Info, code, message);
    }

    pub fn warn(&mut self, code: LogCode, message: impl Into<String>) {
        self.log(Severity::Warn, code, message);
    }

    pub fn error(&mut self, code: LogCode, message: impl Into<String>) {
        self.log(Severity::Error, code, message);
    }

    /// Logs against a file other than the current one.
    pub fn log_for(
        &mut self,
        key: &FileKey,
        severity: Severity,
        code: LogCode,
        message: impl Into<String>,
    ) {
        self.contents
            .log_file(key, LogEntry::new(severity, code, message));
    }

    /// Logs an entry about the workspace as a whole.
    pub fn log_workspace(&mut self, severity: Severity, code: LogCode, message: impl Into<String>) {
        self.contents
            .log_workspace(LogEntry::new(severity, code, message));
    }

    pub fn set_type(&mut self, file_type: FileType) {
        if let Some(key) = &self.current {
            self.contents.set_type(key, file_type);
        }
    }

    /// Renames the current file within its namespace.
    pub fn rename(&mut self, path: &str) -> CheckResult<FileKey> {
        let key = self.current_key()?;
        self.relocate(FileKey::new(key.namespace, path))
    }

    /// Moves the current file to another namespace and path.
    pub fn relocate(&mut self, to: FileKey) -> CheckResult<FileKey> {
        let key = self.current_key()?;
        let moved = self.contents.rename(self.storage, &key, to)?;
        self.current = Some(moved.clone());
        Ok(moved)
    }

    /// Logs why, then soft-deletes the current file.
    pub fn remove(&mut self, severity: Severity, code: LogCode, message: impl Into<String>) -> CheckResult {
        let key = self.current_key()?;
        self.log(severity, code, message);
        let removed = self.contents.remove(self.storage, &key)?;
        self.current = Some(removed);
        Ok(())
    }

    /// Replaces the current file's content. Hooks after this one see the new
    /// bytes; the file is not checked again.
    pub fn replace(&mut self, bytes: &[u8]) -> CheckResult {
        let key = self.current_key()?;
        self.contents.replace(self.storage, &key, bytes)?;
        Ok(())
    }

    /// Creates a new unchecked file next to the current one.
    pub fn create(&mut self, path: &str, bytes: &[u8]) -> CheckResult<FileKey> {
        let namespace = self
            .current
            .as_ref()
            .map_or(Namespace::Source, |k| k.namespace);
        Ok(self
            .contents
            .add(self.storage, FileKey::new(namespace, path), Content::Bytes(bytes))?)
    }

    fn current_key(&self) -> CheckResult<FileKey> {
        self.current.clone().ok_or(CheckError::Stop)
    }
}
