use std::fmt;

use serde::{Deserialize, Serialize};
use sift_store::Location;
use sift_verify::Sha256Hasher;

use crate::file_type::FileType;
use crate::log::LogEntry;

/// Which part of the workspace a file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Source,
    Ancillary,
    Removed,
}

impl Namespace {
    /// Prefix of qualified paths in this namespace.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Source => "",
            Self::Ancillary => "anc/",
            Self::Removed => "removed/",
        }
    }

    pub fn qualify(self, path: &str) -> String {
        format!("{}{path}", self.prefix())
    }

    fn storage_dir(self) -> &'static str {
        match self {
            Self::Source => "src",
            Self::Ancillary => "anc",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Ancillary => "ancillary",
            Self::Removed => "removed",
        })
    }
}

/// Identity of a record in the index: a path within a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey {
    pub namespace: Namespace,
    pub path: String,
}

impl FileKey {
    pub fn new(namespace: Namespace, path: impl Into<String>) -> Self {
        Self {
            namespace,
            path: path.into(),
        }
    }

    pub fn source(path: impl Into<String>) -> Self {
        Self::new(Namespace::Source, path)
    }

    pub fn qualified(&self) -> String {
        self.namespace.qualify(&self.path)
    }

    /// Storage location of the content behind this key.
    ///
    /// Locations are flat digests of the qualified path, so logical paths that
    /// would clash as files and directories on disk (`a` and `a/b`) never do.
    pub fn location(&self) -> sift_store::Result<Location> {
        let digest = Sha256Hasher::hex_digest(self.path.as_bytes());
        Location::new(format!("{}/{digest}", self.namespace.storage_dir()))
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace.prefix(), self.path)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFlags {
    pub is_checked: bool,
    pub is_removed: bool,
    pub is_ancillary: bool,
    pub is_persisted: bool,
    pub is_always_ignore: bool,
}

/// One file in a workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Sanitized path within [`FileRecord::namespace`].
    pub path: String,
    pub namespace: Namespace,
    pub file_type: FileType,
    pub size: u64,
    /// Lowercase hex SHA-256 of the content.
    pub checksum: String,
    pub flags: FileFlags,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl FileRecord {
    pub fn new(key: FileKey, size: u64, checksum: String) -> Self {
        let mut record = Self {
            path: key.path,
            namespace: key.namespace,
            file_type: FileType::Unknown,
            size,
            checksum,
            flags: FileFlags::default(),
            log: Vec::new(),
        };
        record.sync_flags();
        record
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(self.namespace, self.path.clone())
    }

    pub fn qualified_path(&self) -> String {
        self.namespace.qualify(&self.path)
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path, empty at the namespace root.
    pub fn dir(&self) -> &str {
        self.path.rfind('/').map_or("", |i| &self.path[..i])
    }

    pub fn is_active(&self) -> bool {
        self.namespace != Namespace::Removed
    }

    pub fn is_ancillary(&self) -> bool {
        self.namespace == Namespace::Ancillary
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub(crate) fn sync_flags(&mut self) {
        self.flags.is_removed = self.namespace == Namespace::Removed;
        self.flags.is_ancillary = self.namespace == Namespace::Ancillary;
        self.flags.is_always_ignore = self.file_type == FileType::AlwaysIgnore;
    }
}

/// Joins a directory and a name, either of which may be empty.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
