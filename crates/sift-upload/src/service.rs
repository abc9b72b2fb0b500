use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::check::CheckerSet;
use crate::config::{Config, ConflictPolicy};
use crate::error::{Error, Result};
use crate::log::LogEntry;
use crate::metadata::{JsonDirStore, MemoryStore, MetadataStore};
use crate::record::FileRecord;
use crate::workspace::{Capability, Outcome, Payload, Status, Workspace, WorkspaceStatus};

type Handle = Arc<Mutex<Workspace>>;

/// Workspaces by id, with at most one call changing a workspace at a time.
///
/// Live workspaces are cached; others are restored from the metadata store on
/// first use. Metadata is saved after every mutating call, including failed
/// ones, so a partially applied call is never lost.
pub struct WorkspaceService {
    config: Config,
    metadata: Box<dyn MetadataStore>,
    checkers: Arc<CheckerSet>,
    live: Mutex<HashMap<String, Handle>>,
}

impl WorkspaceService {
    pub fn new(config: Config, metadata: impl MetadataStore + 'static) -> Self {
        Self {
            config,
            metadata: Box::new(metadata),
            checkers: Arc::new(CheckerSet::builtin()),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Saves metadata under `config.metadata_dir`, or in memory when unset.
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(match config.metadata_dir.clone() {
            Some(dir) => Self::new(config, JsonDirStore::new(dir)?),
            None => Self::new(config, MemoryStore::new()),
        })
    }

    pub fn with_checkers(mut self, checkers: CheckerSet) -> Self {
        self.checkers = Arc::new(checkers);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates an empty workspace and returns its id.
    pub fn create(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let workspace = Workspace::create(&id, &self.config)?.with_checkers(self.checkers.clone());
        self.metadata.save(&workspace.state())?;
        self.live
            .lock()
            .insert(id.clone(), Arc::new(Mutex::new(workspace)));
        Ok(id)
    }

    pub fn add_files(&self, id: &str, payload: Payload) -> Result<Outcome> {
        self.mutate(id, |ws| ws.add_files(payload))
    }

    pub fn add_file(&self, id: &str, name: &str, bytes: &[u8]) -> Result<Outcome> {
        self.mutate(id, |ws| ws.add_file(name, bytes))
    }

    pub fn remove_file(&self, id: &str, path: &str) -> Result<Outcome> {
        self.mutate(id, |ws| ws.remove_file(path))
    }

    pub fn replace_file(&self, id: &str, path: &str, bytes: &[u8]) -> Result<Outcome> {
        self.mutate(id, |ws| ws.replace_file(path, bytes))
    }

    pub fn remove_all(&self, id: &str) -> Result<Outcome> {
        self.mutate(id, Workspace::remove_all)
    }

    pub fn lock(&self, id: &str, capability: Capability) -> Result<()> {
        self.mutate(id, |ws| ws.lock(capability))
    }

    pub fn unlock(&self, id: &str, capability: Capability) -> Result<()> {
        self.mutate(id, |ws| ws.unlock(capability))
    }

    pub fn persist(&self, id: &str) -> Result<usize> {
        self.mutate(id, Workspace::persist)
    }

    pub fn release(&self, id: &str) -> Result<()> {
        self.mutate(id, Workspace::release)
    }

    /// Deletes a workspace's content. Its metadata is kept, marked purged.
    pub fn purge(&self, id: &str) -> Result<()> {
        self.mutate(id, Workspace::purge)?;
        self.live.lock().remove(id);
        Ok(())
    }

    pub fn list_files(&self, id: &str) -> Result<Vec<FileRecord>> {
        self.read(id, Workspace::list_files)
    }

    pub fn status(&self, id: &str) -> Result<WorkspaceStatus> {
        self.read(id, Workspace::status)
    }

    pub fn log(&self, id: &str) -> Result<Vec<LogEntry>> {
        self.read(id, |ws| ws.log().to_vec())
    }

    pub fn get_package(&self, id: &str) -> Result<Vec<u8>> {
        self.read(id, Workspace::get_package)?
    }

    fn handle(&self, id: &str) -> Result<Handle> {
        let mut live = self.live.lock();
        if let Some(handle) = live.get(id) {
            return Ok(handle.clone());
        }

        let state = self
            .metadata
            .load(id)?
            .ok_or_else(|| Error::NotFound(format!("workspace {id}")))?;
        if state.status == Status::Purged {
            return Err(Error::InvalidState {
                id: id.to_string(),
                status: Status::Purged,
                operation: "open",
            });
        }
        let workspace = Workspace::restore(state, &self.config)?.with_checkers(self.checkers.clone());
        let handle = Arc::new(Mutex::new(workspace));
        live.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    fn mutate<T>(&self, id: &str, apply: impl FnOnce(&mut Workspace) -> Result<T>) -> Result<T> {
        let handle = self.handle(id)?;
        let mut workspace = self.acquire(id, &handle)?;
        let result = apply(&mut *workspace);
        self.metadata.save(&workspace.state())?;
        result
    }

    fn acquire<'a>(&self, id: &str, handle: &'a Handle) -> Result<MutexGuard<'a, Workspace>> {
        match self.config.conflict {
            ConflictPolicy::Wait => Ok(handle.lock()),
            ConflictPolicy::Fail => handle.try_lock().ok_or_else(|| {
                tracing::debug!(id, "workspace busy");
                Error::Busy(id.to_string())
            }),
        }
    }

    /// Runs `view` under the workspace lock and returns an owned snapshot.
    fn read<T>(&self, id: &str, view: impl FnOnce(&Workspace) -> T) -> Result<T> {
        let handle = self.handle(id)?;
        let workspace = handle.lock();
        Ok(view(&*workspace))
    }
}
