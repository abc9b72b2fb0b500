//! Content verification for sift.
//!
//! Checksums are always lowercase hex SHA-256 and always computed from the
//! bytes currently on disk, never cached. [`VerifiedReader`] hashes while data
//! streams through so a copy and its digest cost a single pass.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use sift_verify::{Sha256Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::hex_digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::file::{checksum_file, checksum_reader, verify_file};
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod error;
mod file;
mod hasher;
mod reader;
