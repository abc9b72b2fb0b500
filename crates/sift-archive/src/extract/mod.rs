//! Per-format entry sources.
//!
//! Each source walks its container in stored order and hands every entry to a
//! visitor as a [`PendingEntry`]. The visitor decides what to materialize;
//! nothing in this module writes to disk.

use std::io::Read;

use crate::error::Result;
use crate::format::ArchiveFormat;

mod tar;
mod zip;

pub(crate) use self::tar::TarSource;
pub(crate) use self::zip::ZipSource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PendingKind {
    File,
    Directory,
    Symlink { target: String },
    Hardlink { target: String },
    /// Devices, FIFOs and anything else that is not plain content.
    Special,
}

pub(crate) struct PendingEntry<'a> {
    pub raw_path: String,
    pub size: u64,
    pub mode: Option<u32>,
    pub kind: PendingKind,
    pub reader: &'a mut dyn Read,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) trait EntrySource {
    fn format(&self) -> ArchiveFormat;

    /// Feeds entries to `visit` until the container is exhausted or the
    /// visitor returns [`Flow::Stop`].
    fn visit(&mut self, visit: &mut dyn FnMut(PendingEntry<'_>) -> Result<Flow>) -> Result<()>;
}
