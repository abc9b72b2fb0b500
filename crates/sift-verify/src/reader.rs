use std::io::{self, Read};

use crate::{Hasher, Result, VerificationError};

/// Reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    bytes: u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes: 0,
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Lowercase hex digest of everything read.
    pub fn finish_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Compares the digest of everything read against `expected` (hex).
    pub fn finish(self, expected: &str) -> Result<String> {
        let actual = self.finish_hex();
        if actual.eq_ignore_ascii_case(expected) {
            Ok(actual)
        } else {
            Err(VerificationError::Mismatch {
                expected: expected.to_ascii_lowercase(),
                actual,
            })
        }
    }
}
