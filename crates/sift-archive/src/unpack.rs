use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sift_fs::{AtomicWriteOptions, PermissionMode};

use crate::entry::{Diagnostic, DiagnosticCode, ExtractedFile, Severity, UnpackReport};
use crate::error::{Error, Result};
use crate::extract::{EntrySource, Flow, PendingEntry, PendingKind, TarSource, ZipSource};
use crate::format::{self, ArchiveFormat};
use crate::options::UnpackOptions;
use crate::sanitize::{
    disambiguate, fold_case, resolve_hardlink_target, resolve_link_target, sanitize,
    strip_components,
};

/// Unpacks an archive stream into `scratch_dir`.
///
/// The stream is spooled to a file inside `scratch_dir` first because zip
/// needs random access. See [`unpack_path`].
pub fn unpack(
    mut reader: impl Read,
    scratch_dir: &Path,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    sift_fs::ensure_dir(scratch_dir)?;
    let spool = tempfile::Builder::new()
        .prefix(".upload.")
        .tempfile_in(scratch_dir)
        .map_err(|e| Error::ExtractionFailed {
            path: scratch_dir.to_path_buf(),
            source: e,
        })?;
    io::copy(&mut reader, &mut spool.as_file()).map_err(|e| Error::ExtractionFailed {
        path: spool.path().to_path_buf(),
        source: e,
    })?;
    unpack_path(spool.path(), scratch_dir, options)
}

/// Unpacks the archive at `archive` into `scratch_dir`.
///
/// Files land under opaque names inside `scratch_dir`; their logical paths are
/// carried in the report. Fails with [`Error::UnsupportedFormat`] when the file
/// is not an archive and with [`Error::Corrupted`] when no file at all could be
/// read from it. A root archive damaged partway through yields the files read
/// before the damage plus an `ArchiveCorrupt` error diagnostic. Problems with
/// individual entries, including corrupt nested archives, become diagnostics
/// too.
pub fn unpack_path(
    archive: &Path,
    scratch_dir: &Path,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    let format = format::detect_path(archive)?.ok_or(Error::UnsupportedFormat)?;
    sift_fs::ensure_dir(scratch_dir)?;

    let mut unpacker = Unpacker {
        options,
        scratch_dir,
        files: Vec::new(),
        taken: HashSet::new(),
        diagnostics: Vec::new(),
        entry_count: 0,
        total_bytes: 0,
        next_blob: 0,
        stopped: false,
    };

    tracing::debug!(archive = %archive.display(), ?format, "unpacking");
    match unpacker.unpack_level(archive, format, "", 0) {
        Ok(()) => {}
        Err(Error::Corrupted(reason)) if unpacker.files.iter().any(Option::is_some) => {
            tracing::warn!(archive = %archive.display(), %reason, "archive damaged; keeping entries read so far");
            unpacker.diagnostics.push(Diagnostic::new(
                Severity::Error,
                DiagnosticCode::ArchiveCorrupt,
                format!("archive is damaged ({reason}); entries after the damage were not unpacked"),
            ));
        }
        Err(e) => return Err(e),
    }

    let mut files: Vec<ExtractedFile> = unpacker.files.into_iter().flatten().collect();
    let mut diagnostics = unpacker.diagnostics;
    if options.strip_shared_root {
        strip_shared_root(&mut files, &mut diagnostics);
    }

    tracing::info!(
        files = files.len(),
        entries = unpacker.entry_count,
        bytes = unpacker.total_bytes,
        diagnostics = diagnostics.len(),
        "unpacked archive"
    );

    Ok(UnpackReport {
        format,
        entry_count: unpacker.entry_count,
        total_bytes: unpacker.total_bytes,
        files,
        diagnostics,
    })
}

struct Unpacker<'a> {
    options: &'a UnpackOptions,
    scratch_dir: &'a Path,
    /// Slots are emptied when a nested archive is expanded in place, so that
    /// indices held by [`LevelIndex`] stay valid.
    files: Vec<Option<ExtractedFile>>,
    /// Case-folded logical paths already handed out.
    taken: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    entry_count: usize,
    total_bytes: u64,
    next_blob: u64,
    /// Set once a limit is hit; every level stops reading entries.
    stopped: bool,
}

/// Entries of one archive level, keyed by sanitized path, so that links can
/// find what they point at.
type LevelIndex = HashMap<String, usize>;

impl Unpacker<'_> {
    fn unpack_level(
        &mut self,
        archive: &Path,
        format: ArchiveFormat,
        prefix: &str,
        depth: usize,
    ) -> Result<()> {
        let file = File::open(archive).map_err(|e| Error::ExtractionFailed {
            path: archive.to_path_buf(),
            source: e,
        })?;
        let mut source: Box<dyn EntrySource> = match format {
            ArchiveFormat::Zip => Box::new(ZipSource::new(file)?),
            ArchiveFormat::Tar(codec) => Box::new(TarSource::new(file, codec)?),
        };

        let mut level = LevelIndex::new();
        source.visit(&mut |entry| self.handle_entry(entry, prefix, depth, &mut level))
    }

    fn handle_entry(
        &mut self,
        entry: PendingEntry<'_>,
        prefix: &str,
        depth: usize,
        level: &mut LevelIndex,
    ) -> Result<Flow> {
        if self.stopped {
            return Ok(Flow::Stop);
        }
        if matches!(entry.kind, PendingKind::Directory) {
            return Ok(Flow::Continue);
        }

        self.entry_count += 1;
        if self.entry_count > self.options.max_entries {
            self.stop(
                DiagnosticCode::EntryLimitExceeded,
                format!(
                    "archive has more than {} entries; remaining entries were skipped",
                    self.options.max_entries
                ),
            );
            return Ok(Flow::Stop);
        }

        let sanitized = match sanitize(&entry.raw_path) {
            Ok(s) => s,
            Err(_) => {
                self.diagnostics.push(Diagnostic::new(
                    Severity::Warn,
                    DiagnosticCode::InvalidPath,
                    format!("skipped entry with unusable path '{}'", entry.raw_path),
                ));
                return Ok(Flow::Continue);
            }
        };
        let entry_path = sanitized.path;
        let logical = join(prefix, &entry_path);
        let warnings: Vec<Diagnostic> = sanitized
            .warnings
            .into_iter()
            .map(|w| Diagnostic::new(Severity::Warn, w.code, w.message))
            .collect();

        match entry.kind {
            PendingKind::Directory => Ok(Flow::Continue),
            PendingKind::Special => {
                self.diagnostics.push(
                    Diagnostic::new(
                        Severity::Warn,
                        DiagnosticCode::SpecialEntryDropped,
                        format!("dropped special entry '{}'", entry.raw_path),
                    )
                    .with_path(logical),
                );
                Ok(Flow::Continue)
            }
            PendingKind::Symlink { target } => {
                let resolved = resolve_link_target(&entry_path, &target);
                self.dereference(logical, &target, resolved, prefix, level, warnings)
            }
            PendingKind::Hardlink { target } => {
                let resolved = resolve_hardlink_target(&target);
                self.dereference(logical, &target, resolved, prefix, level, warnings)
            }
            PendingKind::File => {
                let Some(location) = self.write_blob(entry.reader, &logical)? else {
                    return Ok(Flow::Stop);
                };
                let size = std::fs::metadata(&location)
                    .map(|m| m.len())
                    .unwrap_or(entry.size);
                let path = self.claim(&logical, warnings);
                let index = self.files.len();
                self.files.push(Some(ExtractedFile {
                    path,
                    location,
                    size,
                    mode: entry.mode,
                }));
                level.insert(logical, index);

                if !self.stopped {
                    self.expand_nested(index, depth)?;
                }
                Ok(if self.stopped { Flow::Stop } else { Flow::Continue })
            }
        }
    }

    /// Hands out a free logical path for `logical`, recording collision and
    /// sanitization warnings against the final name.
    fn claim(&mut self, logical: &str, warnings: Vec<Diagnostic>) -> String {
        let fold = self.options.case_insensitive;
        let path = disambiguate(logical, |candidate| {
            self.taken.contains(&fold_case(candidate, fold))
        });
        self.taken.insert(fold_case(&path, fold));

        for warning in warnings {
            self.diagnostics.push(warning.with_path(path.clone()));
        }
        if path != logical {
            self.diagnostics.push(
                Diagnostic::new(
                    Severity::Warn,
                    DiagnosticCode::PathCollision,
                    format!("'{logical}' already exists; stored as '{path}'"),
                )
                .with_path(path.clone()),
            );
        }
        path
    }

    fn dereference(
        &mut self,
        logical: String,
        raw_target: &str,
        resolved: Option<String>,
        prefix: &str,
        level: &mut LevelIndex,
        warnings: Vec<Diagnostic>,
    ) -> Result<Flow> {
        let original = resolved
            .map(|target| join(prefix, &target))
            .and_then(|target| level.get(&target).copied())
            .and_then(|index| self.files[index].clone());

        let Some(original) = original else {
            self.diagnostics.push(
                Diagnostic::new(
                    Severity::Warn,
                    DiagnosticCode::LinkDropped,
                    format!("dropped link '{logical}' -> '{raw_target}'"),
                )
                .with_path(logical),
            );
            return Ok(Flow::Continue);
        };

        let mut reader = File::open(&original.location).map_err(|e| Error::ExtractionFailed {
            path: original.location.clone(),
            source: e,
        })?;
        let Some(location) = self.write_blob(&mut reader, &logical)? else {
            return Ok(Flow::Stop);
        };

        let path = self.claim(&logical, warnings);
        self.diagnostics.push(
            Diagnostic::new(
                Severity::Info,
                DiagnosticCode::LinkDereferenced,
                format!("replaced link to '{}' with a copy", original.path),
            )
            .with_path(path.clone()),
        );
        let index = self.files.len();
        self.files.push(Some(ExtractedFile {
            path,
            location,
            size: original.size,
            mode: original.mode,
        }));
        level.insert(logical, index);
        Ok(Flow::Continue)
    }

    /// Writes one entry to a fresh blob. `None` means the byte budget ran out.
    fn write_blob(&mut self, reader: &mut dyn Read, logical: &str) -> Result<Option<PathBuf>> {
        self.next_blob += 1;
        let location = self.scratch_dir.join(format!("{:06}.blob", self.next_blob));
        let budget = self.options.max_total_bytes.saturating_sub(self.total_bytes);
        let mut limited = LimitedReader::new(reader, budget);

        let written = sift_fs::atomic_write_from(
            &location,
            &mut limited,
            AtomicWriteOptions::new().permissions(PermissionMode::File),
        );

        if limited.exceeded {
            let _ = sift_fs::remove_file_if_exists(&location);
            self.stop(
                DiagnosticCode::SizeLimitExceeded,
                format!(
                    "extracted content exceeds {} bytes at '{logical}'; remaining entries were skipped",
                    self.options.max_total_bytes
                ),
            );
            return Ok(None);
        }
        if let Some(err) = limited.error.take() {
            let _ = sift_fs::remove_file_if_exists(&location);
            return Err(Error::Corrupted(format!("{logical}: {err}")));
        }

        self.total_bytes += written?;
        Ok(Some(location))
    }

    fn expand_nested(&mut self, index: usize, depth: usize) -> Result<()> {
        let Some(container) = self.files[index].clone() else {
            return Ok(());
        };
        let Some(format) = format::detect_path(&container.location)? else {
            return Ok(());
        };

        if depth + 1 >= self.options.max_depth {
            self.diagnostics.push(
                Diagnostic::new(
                    Severity::Warn,
                    DiagnosticCode::NestedArchiveTooDeep,
                    format!(
                        "nested archive exceeds depth {}; kept unexpanded",
                        self.options.max_depth
                    ),
                )
                .with_path(container.path.clone()),
            );
            return Ok(());
        }

        let prefix = match container.path.rfind('/') {
            Some(i) => container.path[..i].to_string(),
            None => String::new(),
        };

        let files_before = self.files.len();
        let diagnostics_before = self.diagnostics.len();
        let taken_before = self.taken.clone();

        match self.unpack_level(&container.location, format, &prefix, depth + 1) {
            Ok(()) => {
                self.files[index] = None;
                self.taken.remove(&fold_case(&container.path, self.options.case_insensitive));
                sift_fs::remove_file_if_exists(&container.location)?;
                self.diagnostics.push(
                    Diagnostic::new(
                        Severity::Info,
                        DiagnosticCode::NestedArchiveExpanded,
                        format!("expanded nested archive '{}'", container.path),
                    )
                    .with_path(container.path),
                );
                Ok(())
            }
            Err(Error::Corrupted(reason)) | Err(Error::InvalidPath(reason)) => {
                self.rollback(files_before, diagnostics_before, taken_before);
                tracing::warn!(path = %container.path, %reason, "corrupt nested archive");
                self.diagnostics.push(
                    Diagnostic::new(
                        Severity::Error,
                        DiagnosticCode::NestedArchiveCorrupt,
                        format!("could not unpack nested archive: {reason}"),
                    )
                    .with_path(container.path),
                );
                Ok(())
            }
            Err(Error::UnsupportedFormat) => {
                self.rollback(files_before, diagnostics_before, taken_before);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn rollback(&mut self, files: usize, diagnostics: usize, taken: HashSet<String>) {
        for file in self.files.drain(files..).flatten() {
            let _ = sift_fs::remove_file_if_exists(&file.location);
            self.total_bytes = self.total_bytes.saturating_sub(file.size);
        }
        self.diagnostics.truncate(diagnostics);
        self.taken = taken;
        self.stopped = false;
    }

    fn stop(&mut self, code: DiagnosticCode, message: String) {
        if !self.stopped {
            self.stopped = true;
            tracing::warn!(?code, %message, "unpack limit reached");
            self.diagnostics
                .push(Diagnostic::new(Severity::Error, code, message));
        }
    }
}

/// Removes a single top-level directory shared by every file.
fn strip_shared_root(files: &mut [ExtractedFile], diagnostics: &mut Vec<Diagnostic>) {
    let Some(first) = files.first() else {
        return;
    };
    let Some((root, _)) = first.path.split_once('/') else {
        return;
    };
    let root = root.to_string();
    let shared = files
        .iter()
        .all(|f| f.path.split_once('/').is_some_and(|(r, _)| r == root));
    if !shared {
        return;
    }

    for file in files.iter_mut() {
        if let Some(stripped) = strip_components(&file.path, 1) {
            file.path = stripped;
        }
    }
    for diagnostic in diagnostics.iter_mut() {
        let stripped = diagnostic
            .path
            .as_deref()
            .and_then(|path| path.strip_prefix(root.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string);
        if stripped.is_some() {
            diagnostic.path = stripped;
        }
    }
    diagnostics.push(Diagnostic::new(
        Severity::Warn,
        DiagnosticCode::TopLevelDirectoryStripped,
        format!("removed top-level directory '{root}/' shared by every file"),
    ));
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}

/// Counts bytes and refuses to yield more than `budget`. Records read
/// failures so they can be told apart from write failures.
struct LimitedReader<'a> {
    inner: &'a mut dyn Read,
    remaining: u64,
    exceeded: bool,
    error: Option<io::Error>,
}

impl<'a> LimitedReader<'a> {
    fn new(inner: &'a mut dyn Read, budget: u64) -> Self {
        Self {
            inner,
            remaining: budget,
            exceeded: false,
            error: None,
        }
    }
}

impl Read for LimitedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.inner.read(buf) {
            Ok(n) => n,
            Err(e) => {
                let kind = e.kind();
                let message = e.to_string();
                self.error = Some(e);
                return Err(io::Error::new(kind, message));
            }
        };
        if n as u64 > self.remaining {
            self.exceeded = true;
            return Err(io::Error::other("size limit exceeded"));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
