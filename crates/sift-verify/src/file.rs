use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::{Result, Sha256Hasher, VerificationError, VerifiedReader};

/// Hex SHA-256 of everything `reader` yields, plus the byte count.
pub fn checksum_reader(reader: impl Read) -> Result<(String, u64)> {
    let mut verified = VerifiedReader::new(reader, Sha256Hasher::new());
    io::copy(&mut verified, &mut io::sink())?;
    let bytes = verified.bytes_read();
    Ok((verified.finish_hex(), bytes))
}

/// Hex SHA-256 of a file's current content. Always recomputed.
pub fn checksum_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VerificationError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    checksum_reader(file).map(|(hex, _)| hex)
}

/// Recomputes the checksum of `path` and compares it against `expected`.
pub fn verify_file(path: impl AsRef<Path>, expected: &str) -> Result<String> {
    let actual = checksum_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(actual)
    } else {
        Err(VerificationError::Mismatch {
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_checksum_file_matches_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            checksum_file(&path).unwrap(),
            Sha256Hasher::hex_digest(b"hello world")
        );
    }

    #[test]
    fn test_checksum_missing_file() {
        let dir = tempdir().unwrap();
        let err = checksum_file(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, VerificationError::Read { .. }));
    }

    #[test]
    fn test_verify_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dest");
        std::fs::write(&path, b"payload").unwrap();

        let expected = Sha256Hasher::hex_digest(b"payload");
        assert_eq!(verify_file(&path, &expected.to_uppercase()).unwrap(), expected);

        std::fs::write(&path, b"tampered").unwrap();
        let err = verify_file(&path, &expected).unwrap_err();
        assert!(matches!(err, VerificationError::Mismatch { .. }));
    }
}
