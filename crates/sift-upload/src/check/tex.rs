//! Checks that only make sense for TeX submissions.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CheckContext, CheckResult, Checker};
use crate::file_type::FileType;
use crate::log::{LogCode, Severity};
use crate::record::{FileRecord, join};

static BIB_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+)\.bib$").expect("valid regex"));

static GENERATED_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(.+)\.(aux|log|toc|lof|lot|out|blg|brf|idx|ind|ilg|glo|gls|nav|snm|vrb)$",
    )
    .expect("valid regex")
});

/// Whether `file` has a sibling named `{stem}.{ext}` for any of `exts`.
fn has_sibling(ctx: &CheckContext<'_>, file: &FileRecord, stem: &str, exts: &[&str]) -> bool {
    exts.iter().any(|ext| {
        let sibling = join(file.dir(), &format!("{stem}.{ext}"));
        ctx.exists(file.namespace, &sibling)
    })
}

/// BibTeX is not run on submissions, so a `.bib` is only useful with its
/// processed `.bbl`.
pub struct CheckBibWithoutBbl;

impl Checker for CheckBibWithoutBbl {
    fn name(&self) -> &'static str {
        "CheckBibWithoutBbl"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.is_ancillary() {
            return Ok(());
        }
        let Some(caps) = BIB_FILE.captures(file.name()) else {
            return Ok(());
        };
        let stem = &caps[1];
        if has_sibling(ctx, file, stem, &["bbl"]) {
            ctx.remove(
                Severity::Warn,
                LogCode::BibWithBbl,
                format!(
                    "Removed the file '{}'. Using '{stem}.bbl' for references.",
                    file.name()
                ),
            )?;
        } else {
            ctx.error(
                LogCode::BibWithoutBbl,
                format!(
                    "Your submission contained '{}' but no '{stem}.bbl'. BibTeX is not run on \
                     submissions, please include the generated '{stem}.bbl'.",
                    file.name()
                ),
            );
        }
        Ok(())
    }
}

/// Removes TeX by-products that sit next to their source.
pub struct RemoveTexGeneratedFiles;

impl Checker for RemoveTexGeneratedFiles {
    fn name(&self) -> &'static str {
        "RemoveTexGeneratedFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.is_ancillary() {
            return Ok(());
        }
        let Some(caps) = GENERATED_FILE.captures(file.name()) else {
            return Ok(());
        };
        if has_sibling(ctx, file, &caps[1], &["tex", "TEX"]) {
            ctx.remove(
                Severity::Warn,
                LogCode::TexGeneratedFile,
                format!(
                    "Removed file '{}' due to name conflict with generated files.",
                    file.name()
                ),
            )?;
        }
        Ok(())
    }
}

pub struct DisallowDviFiles;

impl Checker for DisallowDviFiles {
    fn name(&self) -> &'static str {
        "DisallowDviFiles"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Dvi]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if !file.is_ancillary() {
            ctx.error(
                LogCode::DviNotAllowed,
                format!(
                    "'{}' is a DVI file. DVI submissions are not accepted, please submit the \
                     TeX source instead.",
                    file.name()
                ),
            );
        }
        Ok(())
    }
}

/// Rejects formats that cannot be processed at all.
pub struct FlagInvalidFileTypes;

impl Checker for FlagInvalidFileTypes {
    fn name(&self) -> &'static str {
        "FlagInvalidFileTypes"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Docx, FileType::Odf, FileType::Xlsx, FileType::Encrypted]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.is_ancillary() {
            return Ok(());
        }
        let message = match file.file_type {
            FileType::Docx => format!(
                "'{}' is a Microsoft DOCX file. Please save it as PDF or submit the TeX source.",
                file.name()
            ),
            FileType::Odf => format!(
                "'{}' is an OpenDocument file. Please save it as PDF or submit the TeX source.",
                file.name()
            ),
            FileType::Xlsx => format!(
                "'{}' is a Microsoft XLSX spreadsheet, which is not accepted.",
                file.name()
            ),
            _ => format!(
                "'{}' is encrypted. Encrypted files cannot be processed.",
                file.name()
            ),
        };
        ctx.error(LogCode::InvalidFileType, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckerSet;
    use crate::check::testing::{Harness, only};

    #[test]
    fn bib_with_bbl_removed() {
        let mut h = Harness::new();
        h.add("paper/refs.bib", b"@article{x}");
        h.add("paper/refs.bbl", b"\\begin{thebibliography}");
        h.run(&CheckerSet::empty().register(CheckBibWithoutBbl));

        assert_eq!(h.active_paths(), ["paper/refs.bbl"]);
        assert_eq!(h.codes(), [(Severity::Warn, LogCode::BibWithBbl)]);
    }

    #[test]
    fn bib_without_bbl_is_an_error() {
        let mut h = Harness::new();
        h.add("refs.BIB", b"@article{x}");
        h.add("other/refs.bbl", b"x");
        h.run(&CheckerSet::empty().register(CheckBibWithoutBbl));

        assert_eq!(h.active_paths().len(), 2);
        assert_eq!(h.codes(), [(Severity::Error, LogCode::BibWithoutBbl)]);
        assert!(h.contents.has_errors());
    }

    #[test]
    fn generated_files_next_to_source_removed() {
        let mut h = Harness::new();
        h.add("main.tex", b"x");
        h.add("main.aux", b"x");
        h.add("main.LOG", b"x");
        h.add("orphan.toc", b"x");
        h.add("sub/main.idx", b"x");
        h.run(&CheckerSet::empty().register(RemoveTexGeneratedFiles));

        assert_eq!(h.active_paths(), ["main.tex", "orphan.toc", "sub/main.idx"]);
        assert_eq!(
            h.codes(),
            [
                (Severity::Warn, LogCode::TexGeneratedFile),
                (Severity::Warn, LogCode::TexGeneratedFile)
            ]
        );
    }

    #[test]
    fn dvi_rejected_unless_ancillary() {
        let dvi = b"\xf7\x02\x01\x83\x92\xc0\x1c\x3b\x00\x00\x00\x00";
        let mut h = Harness::new();
        h.add("paper.dvi", dvi);
        h.add("anc/paper.dvi", dvi);
        h.run(
            &CheckerSet::empty()
                .register(crate::check::MarkAncillaryFiles)
                .register(crate::check::InferFileType)
                .register(DisallowDviFiles),
        );

        let errors: Vec<_> = h
            .contents
            .log
            .iter()
            .filter(|e| e.is_error())
            .map(|e| (e.code, e.path.clone()))
            .collect();
        assert_eq!(errors, [(LogCode::DviNotAllowed, Some("paper.dvi".into()))]);
    }

    #[test]
    fn office_documents_rejected() {
        let mut h = Harness::new();
        h.add("paper.docx", b"PK\x03\x04 not really a zip");
        h.run(&only(FlagInvalidFileTypes, true));

        assert_eq!(h.record("paper.docx").unwrap().file_type, FileType::Docx);
        assert_eq!(h.codes(), [(Severity::Error, LogCode::InvalidFileType)]);
    }
}
