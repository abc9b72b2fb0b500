use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::ArchiveFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// What an unpack diagnostic is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
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
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            path: None,
            message: message.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A regular file that survived extraction.
#[derive(Clone, Debug)]
pub struct ExtractedFile {
    /// Sanitized, disambiguated logical path.
    pub path: String,
    /// Where the bytes live inside the scratch directory.
    pub location: PathBuf,
    pub size: u64,
    /// Mode bits recorded in the archive. Not applied on disk.
    pub mode: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct UnpackReport {
    pub format: ArchiveFormat,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub files: Vec<ExtractedFile>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnpackReport {
    pub fn diagnostics_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.path.as_deref() == Some(path))
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}
