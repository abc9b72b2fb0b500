pub mod atomic_write;
pub mod move_file;
pub mod remove;

pub use atomic_write::{AtomicWriteOptions, atomic_read, atomic_write, atomic_write_from};
pub use move_file::{FallbackStrategy, MoveOptions, Moved, copy_file, move_file};
pub use remove::{ensure_dir, remove_dir_all_if_exists, remove_file_if_exists};
