//! Filesystem primitives shared by the sift crates.
//!
//! Everything that touches disk on behalf of an upload goes through here:
//! atomic writes so that a crash never leaves a half-written file visible,
//! normalized permission modes, idempotent removal, and a move that falls
//! back to copying when the destination lives on another device.

mod error;
mod permissions;
mod primitives;
mod staging;

pub use error::{Error, Result};
pub use permissions::{DIR_MODE, FILE_MODE, PermissionMode};
pub use primitives::{
    AtomicWriteOptions, FallbackStrategy, MoveOptions, Moved, atomic_read, atomic_write,
    atomic_write_from, copy_file, ensure_dir, move_file, remove_dir_all_if_exists,
    remove_file_if_exists,
};
pub use staging::Staging;
