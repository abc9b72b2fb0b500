use once_cell::sync::Lazy;
use regex::Regex;

use super::{CheckContext, CheckResult, Checker};
use crate::log::{LogCode, Severity};
use crate::record::{FileKey, FileRecord, Namespace};

/// Removes everything under a `__MACOSX` directory.
pub struct RemoveMacOsxFiles;

impl Checker for RemoveMacOsxFiles {
    fn name(&self) -> &'static str {
        "RemoveMacOsxFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.path.split('/').any(|s| s == "__MACOSX") {
            ctx.remove(
                Severity::Warn,
                LogCode::MacOsxFile,
                format!("Removed '{}' from '__MACOSX' directory.", file.path),
            )?;
        }
        Ok(())
    }
}

/// Removes dotfiles and anything inside a dot directory.
pub struct RemoveHiddenFiles;

impl Checker for RemoveHiddenFiles {
    fn name(&self) -> &'static str {
        "RemoveHiddenFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.path.split('/').any(|s| s.starts_with('.')) {
            ctx.remove(
                Severity::Warn,
                LogCode::HiddenFile,
                format!("Removed hidden file '{}' [File not allowed].", file.path),
            )?;
        }
        Ok(())
    }
}

pub struct RemoveZeroLengthFiles;

impl Checker for RemoveZeroLengthFiles {
    fn name(&self) -> &'static str {
        "RemoveZeroLengthFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.is_empty() {
            ctx.remove(
                Severity::Warn,
                LogCode::ZeroLength,
                format!("Removed file '{}' [file is empty].", file.name()),
            )?;
        }
        Ok(())
    }
}

/// Moves source files under `anc/` into the ancillary namespace.
pub struct MarkAncillaryFiles;

impl Checker for MarkAncillaryFiles {
    fn name(&self) -> &'static str {
        "MarkAncillaryFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.namespace != Namespace::Source {
            return Ok(());
        }
        let Some(rest) = file.path.strip_prefix(Namespace::Ancillary.prefix()) else {
            return Ok(());
        };
        let moved = ctx.relocate(FileKey::new(Namespace::Ancillary, rest))?;
        ctx.info(
            LogCode::AncillaryFile,
            format!("Marked '{}' as ancillary.", moved.path),
        );
        Ok(())
    }
}

pub struct WarnAboutProcessedDirectory;

impl Checker for WarnAboutProcessedDirectory {
    fn name(&self) -> &'static str {
        "WarnAboutProcessedDirectory"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if file.dir().split('/').any(|s| s == "processed") {
            ctx.warn(
                LogCode::ProcessedDirectory,
                format!("Detected 'processed' directory in '{}'. Please check.", file.path),
            );
        }
        Ok(())
    }
}

static META_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^xxx\.(rsrc$|finfo$|cshrc$|nfs)").expect("valid regex"));
static GF_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[346]00gf$").expect("valid regex"));
static REVTEX_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(10pt\.rtx|11pt\.rtx|12pt\.rtx|aps\.rtx|revsymb\.sty|revtex4\.cls|rmp\.rtx)$")
        .expect("valid regex")
});

const MISSFONT_MESSAGE: &str = "Detected 'missfont.log' file in uploaded files. This may \
     indicate a problem with the fonts your submission uses. Please correct any issues with \
     fonts and be sure to examine the fonts in the final preview PDF.";

const REVTEX_MESSAGE: &str = "Standard revtex4 style files are supported by the TeX \
     installation and are not needed in the submission. If you have modified these files \
     then you must rename them before including them.";

const DIAGRAMS_MESSAGE: &str = "Standard style files for Paul Taylor's diagrams package \
     are supported by the TeX installation and contain code that stops working after a \
     fixed date.";

const HYPERLINK_MESSAGE: &str =
    "Found hyperlink-compatible package. It is replaced by a hypertex-compatible version.";

const AA_DEMO_MESSAGE: &str = "Assumed to be the example file for the Astronomy and \
     Astrophysics macro package aa.cls.";

/// Why a file name is not allowed in a submission, if it isn't.
fn disallowed_reason(name: &str) -> Option<&'static str> {
    match name {
        "core" | "uufiles" | "splread.1st" => Some("File not allowed."),
        "missfont.log" => Some(MISSFONT_MESSAGE),
        "aa.dem" => Some(AA_DEMO_MESSAGE),
        "diagrams.sty" | "diagrams.tex" => Some(DIAGRAMS_MESSAGE),
        "espcrc2.sty" | "lamuphys.sty" => Some(HYPERLINK_MESSAGE),
        _ if REVTEX_FILE.is_match(name) => Some(REVTEX_MESSAGE),
        _ if META_FILE.is_match(name) || GF_FILE.is_match(name) || name.ends_with(".desc") => {
            Some("File not allowed.")
        }
        _ if name.ends_with(".synctex") => {
            Some("SyncTeX files are not used and may be large.")
        }
        _ => None,
    }
}

/// Removes files that are known junk or are provided by the TeX installation.
pub struct RemoveDisallowedFiles;

impl Checker for RemoveDisallowedFiles {
    fn name(&self) -> &'static str {
        "RemoveDisallowedFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if let Some(reason) = disallowed_reason(file.name()) {
            ctx.remove(
                Severity::Warn,
                LogCode::DisallowedFile,
                format!("Removed file '{}'. {reason}", file.name()),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckerSet;
    use crate::check::testing::Harness;

    #[test]
    fn macosx_and_hidden_files_removed() {
        let mut h = Harness::new();
        h.add("__MACOSX/._main.tex", b"junk");
        h.add("paper/.DS_Store", b"junk");
        h.add(".git/config", b"junk");
        h.add("main.tex", b"\\documentclass{article}");
        h.run(&CheckerSet::empty().register(RemoveMacOsxFiles).register(RemoveHiddenFiles));

        assert_eq!(h.active_paths(), ["main.tex"]);
        let codes = h.codes();
        assert_eq!(codes[0], (Severity::Warn, LogCode::MacOsxFile));
        assert_eq!(codes[1], (Severity::Warn, LogCode::HiddenFile));
        assert_eq!(codes[2], (Severity::Warn, LogCode::HiddenFile));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn zero_length_file_removed_with_one_warning() {
        let mut h = Harness::new();
        h.add("empty.tex", b"");
        h.run(&CheckerSet::builtin());

        assert!(h.active_paths().is_empty());
        let zero: Vec<_> = h
            .codes()
            .into_iter()
            .filter(|c| *c == (Severity::Warn, LogCode::ZeroLength))
            .collect();
        assert_eq!(zero.len(), 1);
        assert!(h.record("removed/empty.tex").unwrap().flags.is_removed);
    }

    #[test]
    fn ancillary_files_relocated() {
        let mut h = Harness::new();
        h.add("anc/data/table.csv", b"1,2");
        h.run(&CheckerSet::empty().register(MarkAncillaryFiles));

        let record = h.record("anc/data/table.csv").unwrap();
        assert_eq!(record.namespace, Namespace::Ancillary);
        assert_eq!(record.path, "data/table.csv");
        assert!(record.flags.is_ancillary);
        assert_eq!(h.codes(), [(Severity::Info, LogCode::AncillaryFile)]);
        assert_eq!(h.content("anc/data/table.csv"), b"1,2");
    }

    #[test]
    fn processed_directory_warned() {
        let mut h = Harness::new();
        h.add("processed/out.tex", b"x");
        h.add("processed.tex", b"x");
        h.run(&CheckerSet::empty().register(WarnAboutProcessedDirectory));

        assert_eq!(h.codes(), [(Severity::Warn, LogCode::ProcessedDirectory)]);
        assert_eq!(h.contents.log[0].path.as_deref(), Some("processed/out.tex"));
    }

    #[test]
    fn disallowed_names() {
        for name in [
            "core",
            "uufiles",
            "splread.1st",
            "xxx.rsrc",
            "xxx.nfs123",
            "font.300gf",
            "paper.desc",
            "missfont.log",
            "paper.synctex",
            "aa.dem",
            "diagrams.sty",
            "revtex4.cls",
            "espcrc2.sty",
        ] {
            assert!(disallowed_reason(name).is_some(), "{name} should be disallowed");
        }
        for name in ["main.tex", "core.tex", "xxx.tex", "revtex4-1.cls", "aps.sty"] {
            assert!(disallowed_reason(name).is_none(), "{name} should be allowed");
        }
    }

    #[test]
    fn disallowed_file_removed() {
        let mut h = Harness::new();
        h.add("sub/core", b"\x7fELF");
        h.add("sub/main.tex", b"x");
        h.run(&CheckerSet::empty().register(RemoveDisallowedFiles));

        assert_eq!(h.active_paths(), ["sub/main.tex"]);
        assert_eq!(h.codes(), [(Severity::Warn, LogCode::DisallowedFile)]);
    }
}
