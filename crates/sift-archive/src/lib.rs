//! Untrusted archive unpacking.
//!
//! # Architecture
//!
//! - `sanitize.rs` - Path sanitization, collision naming, link resolution
//! - `format.rs` - Format detection by magic bytes and codecs
//! - `extract/` - Per-format entry sources (tar, zip)
//! - `unpack.rs` - Recursive extraction into a flat scratch directory
//! - `entry.rs` - Report and diagnostic types
//!
//! Nothing in an archive is trusted. Entry paths are sanitized before use,
//! links are never created on disk, device entries are dropped, permission
//! bits are normalized, and nested archives are expanded only up to a depth
//! bound. Problems with individual entries are reported as [`Diagnostic`]s
//! instead of failing the whole unpack.

pub use entry::{Diagnostic, DiagnosticCode, ExtractedFile, Severity, UnpackReport};
pub use error::{Error, Result};
pub use format::{ArchiveFormat, TarCompress, detect_format, detect_path};
pub use options::UnpackOptions;
pub use sanitize::{
    PathWarning, Sanitized, disambiguate, fold_case, resolve_hardlink_target,
    resolve_link_target, sanitize, strip_components,
};
pub use unpack::{unpack, unpack_path};

mod entry;
mod error;
mod extract;
mod format;
mod options;
pub mod sanitize;
mod unpack;
