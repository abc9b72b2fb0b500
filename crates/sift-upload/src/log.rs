use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sift_archive::DiagnosticCode;
pub use sift_archive::Severity;

/// What a log entry is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCode {
    // Unpacking and path handling.
    AbsolutePath,
    PathTraversal,
    IllegalCharacters,
    PathCollision,
    InvalidPath,
    LinkDereferenced,
    LinkDropped,
    SpecialEntryDropped,
    NestedArchiveExpanded,
    NestedArchiveTooDeep,
    NestedArchiveCorrupt,
    ArchiveCorrupt,
    TopLevelDirectoryStripped,
    EntryLimitExceeded,
    SizeLimitExceeded,

    // Explicit workspace operations.
    FileAdded,
    FileRemoved,
    FileReplaced,

    // Checkers.
    MacOsxFile,
    HiddenFile,
    ZeroLength,
    AncillaryFile,
    ProcessedDirectory,
    TexBackupFile,
    DisallowedFile,
    BibWithBbl,
    BibWithoutBbl,
    TexGeneratedFile,
    DviNotAllowed,
    InvalidFileType,
    PdfInvalid,
    PostscriptRepaired,
    PostscriptPreviewStripped,
    PostscriptPreviewUnpaired,
    PostscriptInvalid,
    TiffPreviewStripped,
    DosEpsCorrupt,
    UuencodedDecoded,
    UuencodedInvalid,
    FileTooLarge,
    PackageTooLarge,
    UnknownFileType,
    AllFilesIgnored,
    NoSourceFiles,
    SingleAncillaryFile,
}

impl From<DiagnosticCode> for LogCode {
    fn from(code: DiagnosticCode) -> Self {
        match code {
            DiagnosticCode::AbsolutePath => Self::AbsolutePath,
            DiagnosticCode::PathTraversal => Self::PathTraversal,
            DiagnosticCode::IllegalCharacters => Self::IllegalCharacters,
            DiagnosticCode::PathCollision => Self::PathCollision,
            DiagnosticCode::InvalidPath => Self::InvalidPath,
            DiagnosticCode::LinkDereferenced => Self::LinkDereferenced,
            DiagnosticCode::LinkDropped => Self::LinkDropped,
            DiagnosticCode::SpecialEntryDropped => Self::SpecialEntryDropped,
            DiagnosticCode::NestedArchiveExpanded => Self::NestedArchiveExpanded,
            DiagnosticCode::NestedArchiveTooDeep => Self::NestedArchiveTooDeep,
            DiagnosticCode::NestedArchiveCorrupt => Self::NestedArchiveCorrupt,
            DiagnosticCode::ArchiveCorrupt => Self::ArchiveCorrupt,
            DiagnosticCode::TopLevelDirectoryStripped => Self::TopLevelDirectoryStripped,
            DiagnosticCode::EntryLimitExceeded => Self::EntryLimitExceeded,
            DiagnosticCode::SizeLimitExceeded => Self::SizeLimitExceeded,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub code: LogCode,
    pub message: String,
    /// Qualified path of the file the entry is about, as it was when logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(severity: Severity, code: LogCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            path: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }
}

impl From<&sift_archive::Diagnostic> for LogEntry {
    fn from(d: &sift_archive::Diagnostic) -> Self {
        Self {
            severity: d.severity,
            code: d.code.into(),
            message: d.message.clone(),
            path: d.path.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_codes_and_severity() {
        let entry = LogEntry::new(Severity::Warn, LogCode::ZeroLength, "empty").with_path("a.tex");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["severity"], "WARN");
        assert_eq!(json["code"], "zero_length");
        assert_eq!(json["path"], "a.tex");

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn workspace_entries_omit_path() {
        let entry = LogEntry::new(Severity::Error, LogCode::PackageTooLarge, "too big");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("path").is_none());
    }

    #[test]
    fn diagnostic_codes_map_by_name() {
        let d = sift_archive::Diagnostic::new(
            Severity::Info,
            DiagnosticCode::NestedArchiveExpanded,
            "expanded",
        )
        .with_path("figs.tar");
        let entry = LogEntry::from(&d);
        assert_eq!(entry.code, LogCode::NestedArchiveExpanded);
        assert_eq!(entry.path.as_deref(), Some("figs.tar"));
    }
}
