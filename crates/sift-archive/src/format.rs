use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar(TarCompress),
}

/// Compression codec wrapped around a tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TarCompress {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl TarCompress {
    pub fn decoder<R: Read>(self, reader: R) -> Result<Decoder<R>> {
        match self {
            Self::None => Ok(Decoder::Passthrough(reader)),
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::GzDecoder::new(
                reader,
            )))),
            Self::Bzip2 => Ok(Decoder::Bzip2(Box::new(bzip2::read::BzDecoder::new(
                reader,
            )))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new(reader)))),
            #[cfg(not(feature = "xz"))]
            Self::Xz => Err(Error::UnsupportedFormat),
            #[cfg(feature = "zstd")]
            Self::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(reader)
                    .map_err(|e| Error::Corrupted(e.to_string()))?;
                Ok(Decoder::Zstd(Box::new(decoder)))
            }
            #[cfg(not(feature = "zstd"))]
            Self::Zstd => Err(Error::UnsupportedFormat),
        }
    }
}

pub enum Decoder<R: Read> {
    Passthrough(R),
    Gzip(Box<flate2::read::GzDecoder<R>>),
    Bzip2(Box<bzip2::read::BzDecoder<R>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
    #[cfg(feature = "zstd")]
    Zstd(Box<zstd::stream::read::Decoder<'static, io::BufReader<R>>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
            #[cfg(feature = "zstd")]
            Self::Zstd(d) => d.read(buf),
        }
    }
}

/// Identifies an archive container by its leading magic bytes.
///
/// A compressed stream is reported as a compressed tarball here. Use
/// [`detect_path`] to confirm that the decompressed stream really is a tar.
pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Tar(TarCompress::Gzip)),
        [b'B', b'Z', b'h', ..] => Some(ArchiveFormat::Tar(TarCompress::Bzip2)),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(ArchiveFormat::Tar(TarCompress::Zstd)),
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Some(ArchiveFormat::Tar(TarCompress::Xz)),
        _ if is_tar_header(data) => Some(ArchiveFormat::Tar(TarCompress::None)),
        _ => None,
    }
}

/// Both the POSIX (`ustar\0`) and GNU (`ustar  \0`) magic start with `ustar`.
pub fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 512 && data[257..262] == *b"ustar"
}

/// Detects whether the file at `path` is an archive sift can unpack.
///
/// A gzip or bzip2 stream that does not decompress to a tar (a single
/// compressed file) is not an archive. A compressed stream whose first block
/// cannot be decompressed is still reported, so that unpacking it surfaces the
/// corruption.
pub fn detect_path(path: &Path) -> Result<Option<ArchiveFormat>> {
    let mut file = File::open(path).map_err(|e| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut head = Vec::with_capacity(512);
    (&mut file).take(512).read_to_end(&mut head)?;

    let codec = match detect_format(&head) {
        Some(ArchiveFormat::Tar(codec)) if codec != TarCompress::None => codec,
        other => return Ok(other),
    };
    let format = ArchiveFormat::Tar(codec);

    let file = File::open(path)?;
    let mut decoder = match codec.decoder(file) {
        Ok(d) => d,
        Err(Error::UnsupportedFormat) => return Ok(None),
        Err(_) => return Ok(Some(format)),
    };
    let mut inner = Vec::with_capacity(512);
    match (&mut decoder).take(512).read_to_end(&mut inner) {
        Ok(_) if is_tar_header(&inner) => Ok(Some(format)),
        Ok(_) => Ok(None),
        Err(_) => Ok(Some(format)),
    }
}
