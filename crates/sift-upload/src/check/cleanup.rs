//! PDF sanity checks and PostScript repair.

use once_cell::sync::Lazy;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use super::file_type::infer_file_type;
use super::{CheckContext, CheckResult, Checker};
use crate::file_type::FileType;
use crate::log::LogCode;
use crate::record::FileRecord;

const PDF_TAIL_BYTES: usize = 1024;

/// Rejects PDFs that are missing their header or `%%EOF` trailer, which is
/// what a truncated upload looks like.
pub struct CheckPdf;

impl Checker for CheckPdf {
    fn name(&self) -> &'static str {
        "CheckPdf"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let content = ctx.read()?;
        let head = &content[..content.len().min(PDF_TAIL_BYTES)];
        let tail = &content[content.len().saturating_sub(PDF_TAIL_BYTES)..];

        let problem = if !contains(head, b"%PDF-") {
            Some("has no PDF header")
        } else if !contains(tail, b"%%EOF") {
            Some("has no '%%EOF' trailer and may be truncated")
        } else {
            None
        };
        if let Some(problem) = problem {
            ctx.error(
                LogCode::PdfInvalid,
                format!("'{}' {problem}. Please upload a complete PDF.", file.name()),
            );
        }
        Ok(())
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn bre(pattern: &str) -> BytesRegex {
    BytesRegex::new(pattern).expect("valid regex")
}

static PS_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.e?psi?$").expect("valid regex"));

static CONTROL_D_HEADER: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^%*\x04%!"));
static DOUBLE_PERCENT_HEADER: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^%%!"));
static PREFIXED_HEADER: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u).*(%!PS-Adobe-)"));
static HEADER: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^%!"));
static PREVIEW_MARKER: Lazy<BytesRegex> =
    Lazy::new(|| bre(r"(?-u)(?i)Thumbnail:|BeginPreview|BeginPhotoshop"));
static AI_END_DATA_BUG: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)\r%/%"));

/// Lines after the first searched for a header.
const HEADER_SEARCH_LINES: usize = 10;

/// Repairs PostScript headers and strips embedded preview images.
///
/// Files typed PostScript have preview, thumbnail and Photoshop blocks
/// removed. PC-style PostScript, and unclassified files with a PostScript
/// name, get a damaged header repaired first and are then reclassified.
pub struct CheckPostscript;

impl Checker for CheckPostscript {
    fn name(&self) -> &'static str {
        "CheckPostscript"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Postscript, FileType::PsPc, FileType::Failed]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        match file.file_type {
            FileType::Postscript => strip_previews(ctx, file),
            FileType::Failed if !PS_NAME.is_match(file.name()) => Ok(()),
            _ => repair_header(ctx, file),
        }
    }
}

struct Repair {
    content: Vec<u8>,
    notes: Vec<&'static str>,
}

/// Rewrites a damaged PostScript header. `None` when no header can be found
/// near the start of the file.
fn repaired(content: &[u8]) -> Option<Repair> {
    let mut notes = Vec::new();
    let mut dropped = 0usize;
    let mut offset = 0usize;

    for (line_no, raw) in content.split_inclusive(|b| *b == b'\n').enumerate() {
        let mut line = raw.to_vec();
        if CONTROL_D_HEADER.is_match(&line) {
            line = CONTROL_D_HEADER.replace(&line, &b"%!"[..]).into_owned();
            notes.push("Removed control character from PS header.");
        }
        if DOUBLE_PERCENT_HEADER.is_match(&line) {
            line = DOUBLE_PERCENT_HEADER.replace(&line, &b"%!"[..]).into_owned();
            notes.push("Removed extra '%' from PS header.");
        }
        if PREFIXED_HEADER.is_match(&line) && !HEADER.is_match(&line) {
            line = PREFIXED_HEADER.replace(&line, &b"$1"[..]).into_owned();
            notes.push("Removed extraneous characters before PS header.");
        }

        if HEADER.is_match(&line) {
            if dropped > 0 {
                notes.push("Removed extraneous lines in front of PS header.");
            }
            let mut fixed = line;
            fixed.extend_from_slice(&content[offset + raw.len()..]);
            return Some(Repair {
                content: fixed,
                notes,
            });
        }
        if line_no >= HEADER_SEARCH_LINES {
            break;
        }
        dropped += 1;
        offset += raw.len();
    }
    None
}

fn repair_header(ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
    let content = ctx.read()?;
    let Some(repair) = repaired(&content) else {
        ctx.error(
            LogCode::PostscriptInvalid,
            format!(
                "'{}' does not have a PostScript header in its first lines and could not be \
                 repaired.",
                file.name()
            ),
        );
        return Ok(());
    };
    if repair.content == content {
        return Ok(());
    }

    ctx.replace(&repair.content)?;
    let file_type = infer_file_type(&file.path, &repair.content);
    ctx.set_type(file_type);
    let outcome = if file_type == FileType::Postscript {
        "Repaired"
    } else {
        "Attempted repairs on"
    };
    ctx.warn(
        LogCode::PostscriptRepaired,
        format!(
            "{outcome} PostScript file '{}': {}",
            file.name(),
            repair.notes.join(" ")
        ),
    );
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum Preview {
    Photoshop,
    Preview,
    Thumbnail,
}

impl Preview {
    const ALL: [Preview; 3] = [Preview::Photoshop, Preview::Preview, Preview::Thumbnail];

    fn label(self) -> &'static str {
        match self {
            Self::Photoshop => "Photoshop",
            Self::Preview => "Preview",
            Self::Thumbnail => "Thumbnail",
        }
    }

    fn marker(self) -> &'static [u8] {
        match self {
            Self::Photoshop => b"beginphotoshop",
            Self::Preview => b"beginpreview",
            Self::Thumbnail => b"thumbnail:",
        }
    }

    fn starts(self, line: &[u8]) -> bool {
        match self {
            Self::Photoshop => line.starts_with(b"%BeginPhotoshop"),
            Self::Preview => line.starts_with(b"%%BeginPreview"),
            Self::Thumbnail => contains(line, b"Thumbnail"),
        }
    }

    fn ends(self, line: &[u8]) -> bool {
        match self {
            Self::Photoshop => line.starts_with(b"%EndPhotoshop"),
            Self::Preview => line.starts_with(b"%%EndPreview"),
            Self::Thumbnail => line.starts_with(b"%%EndData"),
        }
    }
}

enum Stripped {
    Done {
        content: Vec<u8>,
        from_line: usize,
        to_line: usize,
    },
    Unpaired {
        from_line: usize,
    },
    Absent,
}

fn strip(content: &[u8], kind: Preview) -> Stripped {
    let mut kept = Vec::with_capacity(content.len());
    let mut retain = true;
    let mut from_line = None;
    let mut to_line = 0;

    for (i, line) in content.split_inclusive(|b| *b == b'\n').enumerate() {
        if retain && kind.starts(line) {
            retain = false;
            from_line.get_or_insert(i + 1);
        }
        if retain {
            kept.extend_from_slice(line);
        } else if kind.ends(line) {
            retain = true;
            to_line = i + 1;
            if AI_END_DATA_BUG.is_match(line) {
                kept.extend_from_slice(line);
            }
        }
    }

    match from_line {
        None => Stripped::Absent,
        Some(from_line) if !retain => Stripped::Unpaired { from_line },
        Some(from_line) => Stripped::Done {
            content: kept,
            from_line,
            to_line,
        },
    }
}

fn strip_previews(ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
    let mut content = ctx.read()?;
    if !PREVIEW_MARKER.is_match(&content) {
        return Ok(());
    }
    let lowered = content.to_ascii_lowercase();

    for kind in Preview::ALL {
        if !contains(&lowered, kind.marker()) {
            continue;
        }
        match strip(&content, kind) {
            Stripped::Absent => {}
            Stripped::Unpaired { from_line } => ctx.warn(
                LogCode::PostscriptPreviewUnpaired,
                format!(
                    "'{}' has an unpaired {} block starting at line {from_line}. It was left \
                     in place.",
                    file.name(),
                    kind.label()
                ),
            ),
            Stripped::Done {
                content: kept,
                from_line,
                to_line,
            } => {
                ctx.replace(&kept)?;
                ctx.info(
                    LogCode::PostscriptPreviewStripped,
                    format!(
                        "Unnecessary {} removed from '{}' from line {from_line} to line \
                         {to_line}. Reduced from {} bytes to {} bytes.",
                        kind.label(),
                        file.name(),
                        content.len(),
                        kept.len()
                    ),
                );
                content = kept;
            }
        }
    }
    Ok(())
}
