use std::io::{self, Write};
use std::path::PathBuf;

use flate2::{Compression, GzBuilder};
use sift_store::StorageAdapter;
use sift_verify::{Hasher, Sha256Hasher};
use tar::{EntryType, Header};

use crate::error::Result;
use crate::record::FileRecord;

const PACKAGE_MODE: u32 = 0o644;

/// Checksum of a file set: SHA-256 over `path\0checksum\n` lines sorted by
/// qualified path. Independent of index order and of storage layout.
pub fn package_checksum<'a>(files: impl IntoIterator<Item = &'a FileRecord>) -> String {
    let mut pairs: Vec<(String, &str)> = files
        .into_iter()
        .map(|r| (r.qualified_path(), r.checksum.as_str()))
        .collect();
    pairs.sort();

    let mut hasher = Sha256Hasher::new();
    for (path, checksum) in pairs {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(checksum.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize_hex()
}

fn io_error(path: &str) -> impl FnOnce(io::Error) -> crate::Error + '_ {
    move |source| {
        sift_store::Error::Io {
            path: PathBuf::from(path),
            source,
        }
        .into()
    }
}

/// Writes `files` as a gzipped tarball in sorted path order.
///
/// Header metadata is fixed (mtime 0, uid and gid 0, mode 0644, no owner
/// names) so the same file set always produces the same bytes.
pub(crate) fn write_package<'a, W: Write>(
    storage: &dyn StorageAdapter,
    files: impl IntoIterator<Item = &'a FileRecord>,
    writer: W,
) -> Result<W> {
    let mut files: Vec<&FileRecord> = files.into_iter().collect();
    files.sort_by_key(|r| r.qualified_path());

    let encoder = GzBuilder::new()
        .mtime(0)
        .write(writer, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for record in &files {
        let path = record.qualified_path();
        let location = record.key().location()?;
        let size = storage.size(&location)?;
        let reader = storage.open(&location)?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(PACKAGE_MODE);
        header.set_size(size);
        let _ = header.set_username("");
        let _ = header.set_groupname("");
        builder
            .append_data(&mut header, &path, reader)
            .map_err(io_error(&path))?;
    }

    let encoder = builder.into_inner().map_err(io_error("<package>"))?;
    let writer = encoder.finish().map_err(io_error("<package>"))?;
    tracing::debug!(files = files.len(), "wrote package");
    Ok(writer)
}
