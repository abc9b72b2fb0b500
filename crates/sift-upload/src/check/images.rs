use super::{CheckContext, CheckResult, Checker};
use crate::file_type::FileType;
use crate::log::LogCode;
use crate::record::FileRecord;

const DOS_EPS_MAGIC: [u8; 4] = [0xc5, 0xd0, 0xd3, 0xc6];
const DOS_EPS_HEADER_LEN: usize = 30;

/// Section table of a DOS EPS binary header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DosEpsHeader {
    ps_offset: usize,
    ps_len: usize,
    tiff_offset: usize,
    tiff_len: usize,
}

fn le_u32(bytes: &[u8], at: usize) -> usize {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word) as usize
}

impl DosEpsHeader {
    fn parse(content: &[u8]) -> Result<Self, &'static str> {
        if content.len() < DOS_EPS_HEADER_LEN || content[..4] != DOS_EPS_MAGIC {
            return Err("the DOS EPS header is truncated");
        }
        let header = Self {
            ps_offset: le_u32(content, 4),
            ps_len: le_u32(content, 8),
            tiff_offset: le_u32(content, 20),
            tiff_len: le_u32(content, 24),
        };
        let ps_end = header.ps_offset.checked_add(header.ps_len);
        if header.ps_offset < DOS_EPS_HEADER_LEN
            || header.ps_len == 0
            || ps_end.is_none_or(|end| end > content.len())
        {
            return Err("the PostScript section lies outside the file");
        }
        Ok(header)
    }

    fn postscript<'a>(&self, content: &'a [u8]) -> &'a [u8] {
        &content[self.ps_offset..self.ps_offset + self.ps_len]
    }
}

/// Unwraps DOS EPS files: the binary header and any TIFF or WMF preview are
/// dropped, leaving plain PostScript.
pub struct StripTiffPreview;

impl Checker for StripTiffPreview {
    fn name(&self) -> &'static str {
        "StripTiffPreview"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::DosEps]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let content = ctx.read()?;
        let header = match DosEpsHeader::parse(&content) {
            Ok(header) => header,
            Err(reason) => {
                ctx.error(
                    LogCode::DosEpsCorrupt,
                    format!("'{}' is a corrupt DOS EPS file: {reason}.", file.name()),
                );
                return Ok(());
            }
        };

        let postscript = header.postscript(&content);
        if !postscript.starts_with(b"%!") {
            ctx.error(
                LogCode::DosEpsCorrupt,
                format!(
                    "'{}' is a corrupt DOS EPS file: couldn't find the beginning of the \
                     PostScript section.",
                    file.name()
                ),
            );
            return Ok(());
        }

        let what = if header.tiff_offset > 0 && header.tiff_len > 0 {
            "binary header and TIFF preview"
        } else {
            "binary header"
        };
        ctx.replace(postscript)?;
        ctx.set_type(FileType::Postscript);
        ctx.info(
            LogCode::TiffPreviewStripped,
            format!(
                "Stripped DOS EPS {what} from '{}'. Reduced from {} bytes to {} bytes.",
                file.name(),
                content.len(),
                postscript.len()
            ),
        );
        Ok(())
    }
}
