/// Limits and policies for [`crate::unpack`].
#[derive(Clone, Debug)]
pub struct UnpackOptions {
    /// Nesting level at which archives stop being expanded. The root archive
    /// is level 0, so the default of 3 expands two levels of nested archives.
    pub max_depth: usize,
    pub max_entries: usize,
    pub max_total_bytes: u64,
    /// Strip a single top-level directory shared by every file.
    pub strip_shared_root: bool,
    /// Treat paths that differ only in case as colliding.
    pub case_insensitive: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_entries: 10_000,
            max_total_bytes: 2 * 1024 * 1024 * 1024,
            strip_shared_root: true,
            case_insensitive: false,
        }
    }
}

impl UnpackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    pub fn max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    pub fn strip_shared_root(mut self, strip: bool) -> Self {
        self.strip_shared_root = strip;
        self
    }

    pub fn case_insensitive(mut self, fold: bool) -> Self {
        self.case_insensitive = fold;
        self
    }
}
