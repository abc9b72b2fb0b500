use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::file_type::SourceType;
use crate::log::LogEntry;
use crate::record::FileRecord;
use crate::workspace::Status;

/// Everything needed to bring a workspace back, minus its content.
///
/// Storage locations are derived from file keys and never saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub id: String,
    pub status: Status,
    pub locked: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub checksum: String,
    pub source_type: SourceType,
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub notices: Vec<LogEntry>,
    pub files: Vec<FileRecord>,
}

/// Where workspace metadata lives between calls.
pub trait MetadataStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<WorkspaceState>>;

    fn save(&self, state: &WorkspaceState) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, WorkspaceState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<WorkspaceState>> {
        Ok(self.states.read().get(id).cloned())
    }

    fn save(&self, state: &WorkspaceState) -> Result<()> {
        self.states.write().insert(state.id.clone(), state.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document per workspace, `<dir>/<id>.json`,
/// replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        sift_fs::ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(metadata_error(id, "not a valid workspace id"));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

fn metadata_error(id: &str, reason: impl ToString) -> Error {
    Error::Metadata {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

impl MetadataStore for JsonDirStore {
    fn load(&self, id: &str) -> Result<Option<WorkspaceState>> {
        let path = self.path(id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(metadata_error(id, e)),
        };
        let state = serde_json::from_slice(&bytes).map_err(|e| metadata_error(id, e))?;
        Ok(Some(state))
    }

    fn save(&self, state: &WorkspaceState) -> Result<()> {
        let path = self.path(&state.id)?;
        let mut json = serde_json::to_vec_pretty(state).map_err(|e| metadata_error(&state.id, e))?;
        json.push(b'\n');
        sift_fs::atomic_write(&path, &json, sift_fs::AtomicWriteOptions::new().sync(true))?;
        tracing::debug!(id = %state.id, path = %path.display(), "saved workspace metadata");
        Ok(())
    }
}
