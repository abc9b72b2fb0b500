use std::io::Read;

use crate::error::{Error, Result};
use crate::extract::{EntrySource, Flow, PendingEntry, PendingKind};
use crate::format::{ArchiveFormat, Decoder, TarCompress};

pub(crate) struct TarSource<R: Read> {
    archive: tar::Archive<Decoder<R>>,
    codec: TarCompress,
}

impl<R: Read> TarSource<R> {
    pub fn new(reader: R, codec: TarCompress) -> Result<Self> {
        let reader = codec.decoder(reader)?;
        Ok(Self {
            archive: tar::Archive::new(reader),
            codec,
        })
    }
}

impl<R: Read> EntrySource for TarSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar(self.codec)
    }

    fn visit(&mut self, visit: &mut dyn FnMut(PendingEntry<'_>) -> Result<Flow>) -> Result<()> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| Error::Corrupted(e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| Error::Corrupted(e.to_string()))?;

            let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let header = entry.header();
            let size = header.size().unwrap_or(0);
            let mode = header.mode().ok();
            let entry_type = header.entry_type();

            let kind = if entry_type.is_file() || entry_type.is_contiguous() {
                PendingKind::File
            } else if entry_type.is_dir() {
                PendingKind::Directory
            } else if entry_type.is_symlink() || entry_type.is_hard_link() {
                let target = entry
                    .link_name_bytes()
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_default();
                if entry_type.is_symlink() {
                    PendingKind::Symlink { target }
                } else {
                    PendingKind::Hardlink { target }
                }
            } else if entry_type.is_pax_global_extensions() {
                continue;
            } else {
                PendingKind::Special
            };

            let pending = PendingEntry {
                raw_path,
                size,
                mode,
                kind,
                reader: &mut entry,
            };
            if visit(pending)? == Flow::Stop {
                break;
            }
        }
        Ok(())
    }
}
