//! Upload workspaces: unpack what a user sends, check every file, and keep
//! a log of what was found and fixed.
//!
//! A [`Workspace`] owns a [`FileIndex`] and a storage adapter. Each mutating
//! call unpacks or edits files and then runs the [`check::CheckerSet`] over
//! whatever changed through a [`CheckingStrategy`]. The
//! [`WorkspaceService`] maps ids to workspaces, serializes calls per id and
//! saves metadata through a [`MetadataStore`].
//!
//! ```no_run
//! use sift_upload::{Config, Payload, WorkspaceService};
//!
//! # fn main() -> sift_upload::Result<()> {
//! let service = WorkspaceService::from_config(Config::load(None)?)?;
//! let id = service.create()?;
//! let bytes = std::fs::read("paper.tar.gz").unwrap_or_default();
//! let outcome = service.add_files(&id, Payload::new("paper.tar.gz", bytes))?;
//! for entry in outcome.entries() {
//!     println!("{:?} {:?}: {}", entry.severity, entry.path, entry.message);
//! }
//! println!("{:?}", service.status(&id)?.readiness);
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod config;
pub mod error;
pub mod file_type;
pub mod index;
pub mod log;
pub mod metadata;
pub mod package;
pub mod record;
pub mod service;
pub mod strategy;
pub mod workspace;

mod contents;

pub use config::{Config, ConflictPolicy, UnpackLimits};
pub use error::{Error, Result};
pub use file_type::{FileType, SourceType};
pub use index::FileIndex;
pub use log::{LogCode, LogEntry, Severity};
pub use metadata::{JsonDirStore, MemoryStore, MetadataStore, WorkspaceState};
pub use record::{FileFlags, FileKey, FileRecord, Namespace};
pub use service::WorkspaceService;
pub use strategy::{CheckingStrategy, PassSummary, Sequential};
pub use workspace::{
    Capability, Outcome, Payload, Readiness, Status, Workspace, WorkspaceStatus,
};
