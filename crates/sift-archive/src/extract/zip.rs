use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::extract::{EntrySource, Flow, PendingEntry, PendingKind};
use crate::format::ArchiveFormat;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;

pub(crate) struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader).map_err(|e| Error::Corrupted(e.to_string()))?;
        Ok(Self { archive })
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn visit(&mut self, visit: &mut dyn FnMut(PendingEntry<'_>) -> Result<Flow>) -> Result<()> {
        for index in 0..self.archive.len() {
            let mut file = self
                .archive
                .by_index(index)
                .map_err(|e| Error::Corrupted(e.to_string()))?;

            let raw_path = file.name().to_string();
            let size = file.size();
            let mode = file.unix_mode();
            let file_type = mode.map(|m| m & S_IFMT);

            let kind = if file.is_dir() || file_type == Some(S_IFDIR) {
                PendingKind::Directory
            } else if file_type == Some(S_IFLNK) {
                let mut target = String::new();
                file.read_to_string(&mut target)
                    .map_err(|e| Error::Corrupted(e.to_string()))?;
                PendingKind::Symlink { target }
            } else if matches!(file_type, None | Some(0) | Some(S_IFREG)) {
                PendingKind::File
            } else {
                PendingKind::Special
            };

            let pending = PendingEntry {
                raw_path,
                size,
                mode: mode.map(|m| m & 0o7777),
                kind,
                reader: &mut file,
            };
            if visit(pending)? == Flow::Stop {
                break;
            }
        }
        Ok(())
    }
}
