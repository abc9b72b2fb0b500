use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sift_upload::{Config, LogEntry, Outcome, Payload, Readiness, WorkspaceService, WorkspaceStatus};

pub mod check;
pub mod config;
pub mod pack;

/// One throwaway workspace holding the files named on the command line.
pub struct Session {
    service: WorkspaceService,
    id: String,
}

impl Session {
    pub fn open(config: Config) -> Result<Self> {
        let service = WorkspaceService::from_config(config)?;
        let id = service.create().context("failed to create a workspace")?;
        tracing::info!(%id, "opened workspace");
        Ok(Self { service, id })
    }

    pub fn upload(&self, inputs: &[PathBuf]) -> Result<Vec<Outcome>> {
        inputs
            .iter()
            .map(|input| {
                let payload = read_payload(input)?;
                self.service
                    .add_files(&self.id, payload)
                    .with_context(|| format!("failed to add {}", input.display()))
            })
            .collect()
    }

    pub fn status(&self) -> Result<WorkspaceStatus> {
        Ok(self.service.status(&self.id)?)
    }

    pub fn log(&self) -> Result<Vec<LogEntry>> {
        Ok(self.service.log(&self.id)?)
    }

    pub fn package(&self) -> Result<Vec<u8>> {
        Ok(self.service.get_package(&self.id)?)
    }

    /// Purges the workspace unless asked to keep it.
    pub fn finish(self, keep: bool) -> Result<()> {
        if keep {
            eprintln!("kept workspace {}", self.id);
            return Ok(());
        }
        self.service.purge(&self.id)?;
        Ok(())
    }
}

fn read_payload(path: &Path) -> Result<Payload> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(Payload::new(name, bytes))
}

pub fn print_entries<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) {
    for entry in entries {
        match &entry.path {
            Some(path) => println!("{:<5} {path}: {}", entry.severity, entry.message),
            None => println!("{:<5} {}", entry.severity, entry.message),
        }
    }
}

pub fn print_summary(status: &WorkspaceStatus) {
    println!(
        "{} source, {} ancillary, {} removed; {} bytes; source type {}; {}",
        status.source_files,
        status.ancillary_files,
        status.removed_files,
        status.total_bytes,
        status.source_type,
        readiness_label(status.readiness)
    );
}

pub fn readiness_label(readiness: Readiness) -> &'static str {
    match readiness {
        Readiness::Ready => "ready",
        Readiness::ReadyWithWarnings => "ready with warnings",
        Readiness::Errors => "not ready",
    }
}

pub fn exit_code(readiness: Readiness) -> i32 {
    match readiness {
        Readiness::Errors => 1,
        Readiness::Ready | Readiness::ReadyWithWarnings => 0,
    }
}
