//! File type inference.
//!
//! Classification runs three stages and stops at the first hit: the file
//! name, magic bytes in the first kilobyte, then a line-by-line scan of the
//! content for TeX, PostScript, BibTeX, HTML and uuencode markers.

use once_cell::sync::Lazy;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use super::{CheckContext, CheckResult, Checker};
use crate::file_type::FileType;
use crate::record::FileRecord;

const HEAD_BYTES: usize = 1024;

/// Classifies files that have not been typed yet.
pub struct InferFileType;

impl Checker for InferFileType {
    fn name(&self) -> &'static str {
        "InferFileType"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Unknown]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let content = ctx.read()?;
        let file_type = infer_file_type(&file.path, &content);
        tracing::debug!(path = %file.path, %file_type, "inferred file type");
        ctx.set_type(file_type);
        Ok(())
    }
}

/// Detects the type of a file from its path and content.
///
/// Returns [`FileType::Failed`] when nothing matches.
pub fn infer_file_type(path: &str, content: &[u8]) -> FileType {
    by_name(path, content.len())
        .or_else(|| by_magic(path, &content[..content.len().min(HEAD_BYTES)]))
        .or_else(|| by_lines(content))
        .unwrap_or(FileType::Failed)
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

fn bre(pattern: &str) -> BytesRegex {
    BytesRegex::new(pattern).expect("valid regex")
}

static NAME_RULES: Lazy<Vec<(Regex, FileType)>> = Lazy::new(|| {
    vec![
        (re(r"(^|/)00README\.XXX$"), FileType::Readme),
        (re(r"(^|/)(head|body)\.tmp$"), FileType::AlwaysIgnore),
        (
            re(r"(?i)\.(sty|cls|mf|\d*pk|bbl|bst|tfm|ax|def|log|hrfldf|cfg|clo|inx|end|fgx|tbx|rtx|rty|toc)$"),
            FileType::TexAux,
        ),
        (re(r"\.abs$"), FileType::Abs),
        (re(r"\.fig$"), FileType::Ignore),
        (re(r"(?i)\.nb$"), FileType::Notebook),
        (re(r"(?i)\.inp$"), FileType::Input),
        (re(r"(?i)\.html?$"), FileType::Html),
        (re(r"\.cry$"), FileType::Encrypted),
    ]
});

fn by_name(path: &str, size: usize) -> Option<FileType> {
    NAME_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(path))
        .map(|(_, file_type)| *file_type)
        .or((size == 0).then_some(FileType::Ignore))
}

static TIFF_NAME: Lazy<Regex> = Lazy::new(|| re(r"(?i)\.tiff?$"));
static ZIP_FLAVOURS: Lazy<Vec<(Regex, FileType)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\.odt$"), FileType::Odf),
        (re(r"(?i)\.docx$"), FileType::Docx),
        (re(r"(?i)\.xlsx$"), FileType::Xlsx),
    ]
});

fn by_magic(path: &str, head: &[u8]) -> Option<FileType> {
    let at = |i: usize| head.get(i).copied();

    if head.starts_with(&[0x1f, 0x9d]) {
        return Some(FileType::Compressed);
    }
    if head.starts_with(&[0x1f, 0x8b]) {
        return Some(FileType::Gzipped);
    }
    if head.starts_with(b"BZh") && at(3).is_some_and(|b| b > 0x2f) {
        return Some(FileType::Bzip2);
    }
    if head.get(257..262) == Some(b"ustar".as_slice()) {
        return Some(FileType::Tar);
    }
    if head.starts_with(&[0xf7, 0x02]) {
        return Some(FileType::Dvi);
    }
    if head.starts_with(b"GIF8") || head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(FileType::Image);
    }
    if TIFF_NAME.is_match(path) && (head.starts_with(b"MM") || head.starts_with(b"II")) {
        return Some(FileType::Tiff);
    }
    if head.starts_with(&[0xff, 0xd8, 0xff]) && (at(3) == Some(0xe0) || at(4) == Some(0xee)) {
        return Some(FileType::Image);
    }
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK00PK\x03\x04") {
        let flavour = ZIP_FLAVOURS
            .iter()
            .find(|(pattern, _)| pattern.is_match(path))
            .map_or(FileType::Zip, |(_, file_type)| *file_type);
        return Some(flavour);
    }
    if head.starts_with(&[0xc5, 0xd0, 0xd3, 0xc6]) {
        return Some(FileType::DosEps);
    }
    if contains(head, b"%PDF-") {
        return Some(FileType::Pdf);
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

static AUTO_IGNORE: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)%auto-ignore"));
static TEXINFO: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)\\input texinfo"));
static PS_FONT: Lazy<BytesRegex> = Lazy::new(|| {
    bre(r"(?-u)(?ms)^(......)?%!(PS-AdobeFont-1\.|FontType1|PS-Adobe-3\.0 Resource-Font)")
});
static POSTSCRIPT: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^%!"));
static PS_PC: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)(^%*\x04%!)|(.*%!PS-Adobe)"));
static PS: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^%!PS"));
static LATEX_MACRO: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^\r?%&(\S+)"));
static HTML: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)(?i)<html[>\s]"));
static PERCENT_COMMENT: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)%[^\r]*"));
static LATEX: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)(^|\r)\s*\\documentstyle"));
static LATEX2E: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)(^|\r)\s*\\documentclass"));
static MAYBE_TEX: Lazy<BytesRegex> = Lazy::new(|| {
    bre(r"(?-u)(^|\r)\s*(\\font|\\magnification|\\input|\\def|\\special|\\baselineskip|\\begin)")
});
static TEX_PRIORITY: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)\\input\s+amstex"));
static END_AT_LINE_START: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)(^|\r)\s*\\(end|bye)(\s|$)"));
static END_ANYWHERE: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)\\(end|bye)(\s|$)"));
static TEX_MAC: Lazy<BytesRegex> =
    Lazy::new(|| bre(r"(?-u)(\\input *(harv|lanl)mac)|(\\input\s+phyzzx)"));
static BIBTEX: Lazy<BytesRegex> =
    Lazy::new(|| bre(r"(?-u)(?i)(^|\r)@(book|article|inbook|unpublished)\{"));
static UU_BEGIN: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^begin \d{1,4}\s+\S+\r?$"));
static ALWAYS_IGNORE: Lazy<BytesRegex> =
    Lazy::new(|| bre(r"(?-u)paper deliberately replaced by what little"));
static INCLUDE_GRAPHICS: Lazy<BytesRegex> = Lazy::new(|| {
    bre(r"(?-u)(?i)^[^%]*\\includegraphics[^%]*\.(?:pdf|png|gif|jpg)\s?\}")
});
static PDF_OUTPUT: Lazy<BytesRegex> = Lazy::new(|| bre(r"(?-u)^[^%]*\\pdfoutput\s*=\s*1"));

/// Lines of `content` without their `\n` terminator.
fn lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split_inclusive(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\n").unwrap_or(line))
}

fn by_lines(content: &[u8]) -> Option<FileType> {
    let mut maybe_tex = false;
    let mut end_at_line_start = false;
    let mut end_anywhere = false;
    let mut seen = 0usize;

    for (i, raw) in lines(content).enumerate() {
        let line_no = i + 1;
        seen += raw.len() + 1;

        if line_no <= 10 && AUTO_IGNORE.is_match(raw) {
            return Some(FileType::Ignore);
        }
        if line_no <= 10 && TEXINFO.is_match(raw) {
            return Some(FileType::TexInfo);
        }
        if line_no == 1 && raw.starts_with(b"%!TEX ") {
            return Some(latex2e_flavour(content, line_no));
        }

        let accum = &content[..seen.min(content.len())];
        if line_no <= 7 && PS_FONT.is_match(accum) {
            return Some(FileType::PsFont);
        }
        if line_no == 1 && POSTSCRIPT.is_match(raw) {
            return Some(FileType::Postscript);
        }
        if (line_no == 1 && PS_PC.is_match(raw)) || (line_no <= 10 && PS.is_match(raw) && !maybe_tex) {
            return Some(FileType::PsPc);
        }
        if line_no <= 12 {
            if let Some(caps) = LATEX_MACRO.captures(raw) {
                return Some(match &caps[1] {
                    b"latex209" | b"biglatex" | b"latex" | b"LaTeX" => FileType::Latex,
                    _ => FileType::TexMac,
                });
            }
        }
        if line_no <= 10 && HTML.is_match(raw) {
            return Some(FileType::Html);
        }

        // Everything below ignores % comments.
        let stripped = PERCENT_COMMENT.replace_all(raw, &b""[..]);
        let line: &[u8] = &stripped;

        if LATEX.is_match(line) {
            return Some(FileType::Latex);
        }
        if LATEX2E.is_match(line) {
            return Some(latex2e_flavour(content, line_no));
        }
        if MAYBE_TEX.is_match(line) {
            maybe_tex = true;
            if TEX_PRIORITY.is_match(line) {
                return Some(FileType::TexPriority);
            }
        }
        end_at_line_start |= END_AT_LINE_START.is_match(line);
        end_anywhere |= END_ANYWHERE.is_match(line);

        if TEX_MAC.is_match(line) {
            return Some(FileType::TexMac);
        }
        if BIBTEX.is_match(line) {
            return Some(FileType::BibTex);
        }
        if UU_BEGIN.is_match(line) {
            return Some(if end_at_line_start {
                FileType::TexPriority
            } else if maybe_tex {
                FileType::Tex
            } else {
                FileType::Uuencoded
            });
        }
        if ALWAYS_IGNORE.is_match(line) {
            return Some(FileType::AlwaysIgnore);
        }
    }

    if end_at_line_start {
        Some(FileType::TexPriority)
    } else if end_anywhere {
        Some(FileType::TexPriority2)
    } else if maybe_tex {
        Some(FileType::Tex)
    } else {
        None
    }
}

/// PDFLaTeX when the document includes PDF-friendly graphics anywhere, or
/// sets `\pdfoutput=1` near the class declaration found on `found_at`.
fn latex2e_flavour(content: &[u8], found_at: usize) -> FileType {
    let limit = found_at + 5;
    let pdf = lines(content).enumerate().any(|(i, line)| {
        INCLUDE_GRAPHICS.is_match(line) || (i + 1 < limit && PDF_OUTPUT.is_match(line))
    });
    if pdf {
        FileType::PdfLatex
    } else {
        FileType::Latex2e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckerSet;
    use crate::check::testing::Harness;

    #[test]
    fn names_win_over_content() {
        assert_eq!(infer_file_type("00README.XXX", b"x"), FileType::Readme);
        assert_eq!(infer_file_type("sub/head.tmp", b"x"), FileType::AlwaysIgnore);
        assert_eq!(infer_file_type("mystyle.sty", b"\\documentclass{x}"), FileType::TexAux);
        assert_eq!(infer_file_type("font.600pk", b"x"), FileType::TexAux);
        assert_eq!(infer_file_type("fig.fig", b"x"), FileType::Ignore);
        assert_eq!(infer_file_type("index.HTM", b"x"), FileType::Html);
        assert_eq!(infer_file_type("data.inp", b"x"), FileType::Input);
        assert_eq!(infer_file_type("secret.cry", b"x"), FileType::Encrypted);
        assert_eq!(infer_file_type("empty.tex", b""), FileType::Ignore);
    }

    #[test]
    fn magic_bytes() {
        assert_eq!(infer_file_type("a", b"\x1f\x8b\x08\x00"), FileType::Gzipped);
        assert_eq!(infer_file_type("a", b"\x1f\x9d\x90"), FileType::Compressed);
        assert_eq!(infer_file_type("a", b"BZh91AY"), FileType::Bzip2);
        assert_eq!(infer_file_type("a.dvi", b"\xf7\x02\x01"), FileType::Dvi);
        assert_eq!(infer_file_type("a.gif", b"GIF89a"), FileType::Image);
        assert_eq!(infer_file_type("a.png", b"\x89PNG\r\n\x1a\n...."), FileType::Image);
        assert_eq!(infer_file_type("a.jpg", b"\xff\xd8\xff\xe0\x00\x10JFIF"), FileType::Image);
        assert_eq!(infer_file_type("a.tif", b"II*\x00"), FileType::Tiff);
        assert_eq!(infer_file_type("a.zip", b"PK\x03\x04rest"), FileType::Zip);
        assert_eq!(infer_file_type("a.DOCX", b"PK\x03\x04rest"), FileType::Docx);
        assert_eq!(infer_file_type("a.odt", b"PK\x03\x04rest"), FileType::Odf);
        assert_eq!(infer_file_type("a.eps", b"\xc5\xd0\xd3\xc6rest"), FileType::DosEps);
        assert_eq!(infer_file_type("a.pdf", b"%PDF-1.5\n"), FileType::Pdf);
        assert_eq!(infer_file_type("a.pdf", b"junk\n%PDF-1.5\n"), FileType::Pdf);

        let mut tar = vec![0u8; 512];
        tar[257..262].copy_from_slice(b"ustar");
        assert_eq!(infer_file_type("a", &tar), FileType::Tar);
    }

    #[test]
    fn tex_flavours() {
        assert_eq!(
            infer_file_type("a.tex", b"\\documentclass{article}\n\\begin{document}\n"),
            FileType::Latex2e
        );
        assert_eq!(
            infer_file_type(
                "a.tex",
                b"\\documentclass{article}\n\\begin{document}\n\\includegraphics{fig.pdf}\n"
            ),
            FileType::PdfLatex
        );
        assert_eq!(
            infer_file_type("a.tex", b"\\pdfoutput=1\n\\documentclass{article}\n"),
            FileType::PdfLatex
        );
        assert_eq!(infer_file_type("a.tex", b"\\documentstyle{article}\n"), FileType::Latex);
        assert_eq!(
            infer_file_type("a.tex", b"% \\documentclass{article}\nhello\n"),
            FileType::Failed
        );
        assert_eq!(infer_file_type("a.tex", b"\\input amstex\n"), FileType::TexPriority);
        assert_eq!(infer_file_type("a.tex", b"\\input harvmac\n"), FileType::TexMac);
        assert_eq!(infer_file_type("a.tex", b"%&latex\n"), FileType::Latex);
        assert_eq!(infer_file_type("a.tex", b"%&mymacros\n"), FileType::TexMac);
        assert_eq!(infer_file_type("a.tex", b"\\def\\x{1}\n\\bye\n"), FileType::TexPriority);
        assert_eq!(infer_file_type("a.tex", b"\\def\\x{1}\n"), FileType::Tex);
        assert_eq!(infer_file_type("a.tex", b"text \\end\n"), FileType::TexPriority2);
        assert_eq!(infer_file_type("a.texi", b"\\input texinfo\n"), FileType::TexInfo);
    }

    #[test]
    fn other_line_markers() {
        assert_eq!(infer_file_type("a.ps", b"%!PS-Adobe-3.0\n"), FileType::Postscript);
        assert_eq!(infer_file_type("a.ps", b"\x04%!PS-Adobe-2.0\n"), FileType::PsPc);
        assert_eq!(infer_file_type("a.ps", b"garbage\n%!PS-Adobe-2.0\n"), FileType::PsPc);
        assert_eq!(
            infer_file_type("a.pfa", b"%!PS-AdobeFont-1.0: Foo\n"),
            FileType::PsFont
        );
        assert_eq!(
            infer_file_type("page", b"<!DOCTYPE x>\n<HTML>\n<body>\n"),
            FileType::Html
        );
        assert_eq!(infer_file_type("refs", b"@article{key,\n"), FileType::BibTex);
        assert_eq!(
            infer_file_type("paper.uu", b"begin 644 paper.tex\nM\nend\n"),
            FileType::Uuencoded
        );
        assert_eq!(infer_file_type("x", b"%auto-ignore\n"), FileType::Ignore);
        assert_eq!(
            infer_file_type("x", b"This paper deliberately replaced by what little\n"),
            FileType::AlwaysIgnore
        );
        assert_eq!(infer_file_type("x", b"plain words\n"), FileType::Failed);
    }

    #[test]
    fn checker_types_unknown_files_once() {
        let mut h = Harness::new();
        h.add("main.tex", b"\\documentclass{article}\n");
        h.add("fig.png", b"\x89PNG\r\n\x1a\n");
        h.run(&CheckerSet::empty().register(InferFileType));

        assert_eq!(h.record("main.tex").unwrap().file_type, FileType::Latex2e);
        assert_eq!(h.record("fig.png").unwrap().file_type, FileType::Image);
        assert!(h.codes().is_empty());
    }
}
