use super::{CheckContext, CheckResult, Checker};
use crate::file_type::{FileType, SourceType};
use crate::log::{LogCode, LogEntry, Severity};
use crate::record::{FileRecord, Namespace};

/// Decides what kind of submission the workspace holds.
///
/// Recomputed from the whole index every time workspace hooks run. Problems
/// are reported as workspace-level entries so that they disappear once the
/// file set changes.
pub struct InferSourceType;

impl Checker for InferSourceType {
    fn name(&self) -> &'static str {
        "InferSourceType"
    }

    fn check_workspace(&self, ctx: &mut CheckContext<'_>) -> CheckResult {
        let (source_type, problem) = infer_source_type(ctx.index().active());
        if let Some(Problem {
            severity,
            code,
            message,
            path,
        }) = problem
        {
            let mut entry = LogEntry::new(severity, code, message);
            if let Some(path) = path {
                entry = entry.with_path(path);
            }
            ctx.contents_mut().log_workspace(entry);
        }
        if source_type != ctx.source_type() {
            tracing::debug!(from = %ctx.source_type(), to = %source_type, "source type changed");
        }
        ctx.set_source_type(source_type);
        Ok(())
    }
}

struct Problem {
    severity: Severity,
    code: LogCode,
    message: String,
    path: Option<String>,
}

impl Problem {
    fn new(severity: Severity, code: LogCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            path: None,
        }
    }

    fn about(mut self, file: &FileRecord) -> Self {
        self.path = Some(file.qualified_path());
        self
    }
}

fn is_html_companion(t: FileType) -> bool {
    t == FileType::Html
        || t.is_image()
        || t.is_ignorable()
        || matches!(t, FileType::Postscript | FileType::Pdf | FileType::Readme)
}

fn is_postscript_companion(t: FileType) -> bool {
    t.is_image()
        || t.is_ignorable()
        || matches!(t, FileType::Postscript | FileType::PsPc | FileType::Pdf)
}

fn infer_source_type<'a>(
    active: impl Iterator<Item = &'a FileRecord>,
) -> (SourceType, Option<Problem>) {
    let mut sources = Vec::new();
    let mut ancillary = 0usize;
    for record in active {
        match record.namespace {
            Namespace::Source => sources.push(record),
            Namespace::Ancillary => ancillary += 1,
            Namespace::Removed => {}
        }
    }

    if sources.is_empty() {
        let problem = match ancillary {
            0 => None,
            1 => Some(Problem::new(
                Severity::Error,
                LogCode::SingleAncillaryFile,
                "Found single ancillary file. Invalid submission.",
            )),
            _ => Some(Problem::new(
                Severity::Warn,
                LogCode::NoSourceFiles,
                "No source files found, only ancillary files.",
            )),
        };
        return (SourceType::Invalid, problem);
    }

    if sources.iter().all(|r| r.file_type.is_ignorable()) {
        return (
            SourceType::Invalid,
            Some(Problem::new(
                Severity::Warn,
                LogCode::AllFilesIgnored,
                "All files are auto-ignore. If you intended to withdraw the article, please use \
                 the withdraw function instead.",
            )),
        );
    }

    if let [only] = sources.as_slice() {
        let file_type = only.file_type;
        return match file_type {
            t if t.is_tex_type() => (SourceType::Tex, None),
            FileType::Pdf => (SourceType::Pdf, None),
            FileType::Postscript | FileType::PsPc => (SourceType::Postscript, None),
            FileType::Html => (SourceType::Html, None),
            FileType::Failed | FileType::Unknown => (
                SourceType::Invalid,
                Some(
                    Problem::new(
                        Severity::Error,
                        LogCode::UnknownFileType,
                        format!("Could not determine the file type of '{}'.", only.name()),
                    )
                    .about(only),
                ),
            ),
            other => (
                SourceType::Invalid,
                Some(
                    Problem::new(
                        Severity::Error,
                        LogCode::InvalidFileType,
                        format!(
                            "'{}' appears to be a single {other} file, which is not a valid \
                             submission on its own.",
                            only.name()
                        ),
                    )
                    .about(only),
                ),
            ),
        };
    }

    let count = |t: FileType| sources.iter().filter(|r| r.file_type == t).count();
    let all = |pred: fn(FileType) -> bool| sources.iter().all(|r| pred(r.file_type));

    let source_type = if count(FileType::Html) > 0 && all(is_html_companion) {
        SourceType::Html
    } else if count(FileType::Postscript) > 0 && all(is_postscript_companion) {
        SourceType::Postscript
    } else {
        SourceType::Tex
    };
    (source_type, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::testing::{Harness, only};
    use crate::record::FileKey;

    fn infer(files: &[(&str, FileType)]) -> (SourceType, Option<LogCode>) {
        let records: Vec<_> = files
            .iter()
            .map(|(path, file_type)| {
                let key = match path.strip_prefix("anc/") {
                    Some(rest) => FileKey::new(Namespace::Ancillary, rest),
                    None => FileKey::source(*path),
                };
                let mut record = FileRecord::new(key, 1, String::new());
                record.file_type = *file_type;
                record
            })
            .collect();
        let (source_type, problem) = infer_source_type(records.iter());
        (source_type, problem.map(|p| p.code))
    }

    #[test]
    fn single_files() {
        assert_eq!(infer(&[("a.tex", FileType::Latex2e)]), (SourceType::Tex, None));
        assert_eq!(infer(&[("a.pdf", FileType::Pdf)]), (SourceType::Pdf, None));
        assert_eq!(infer(&[("a.ps", FileType::PsPc)]), (SourceType::Postscript, None));
        assert_eq!(infer(&[("a.html", FileType::Html)]), (SourceType::Html, None));
        assert_eq!(
            infer(&[("a", FileType::Failed)]),
            (SourceType::Invalid, Some(LogCode::UnknownFileType))
        );
        assert_eq!(
            infer(&[("a.sty", FileType::TexAux)]),
            (SourceType::Invalid, Some(LogCode::InvalidFileType))
        );
    }

    #[test]
    fn empty_and_ancillary_only() {
        assert_eq!(infer(&[]), (SourceType::Invalid, None));
        assert_eq!(
            infer(&[("anc/data.csv", FileType::Failed)]),
            (SourceType::Invalid, Some(LogCode::SingleAncillaryFile))
        );
        assert_eq!(
            infer(&[("anc/a.csv", FileType::Failed), ("anc/b.csv", FileType::Failed)]),
            (SourceType::Invalid, Some(LogCode::NoSourceFiles))
        );
        assert_eq!(
            infer(&[("a", FileType::Ignore), ("b", FileType::AlwaysIgnore)]),
            (SourceType::Invalid, Some(LogCode::AllFilesIgnored))
        );
    }

    #[test]
    fn mixed_packages() {
        assert_eq!(
            infer(&[("index.html", FileType::Html), ("fig.png", FileType::Image)]),
            (SourceType::Html, None)
        );
        assert_eq!(
            infer(&[("a.ps", FileType::Postscript), ("b.pdf", FileType::Pdf)]),
            (SourceType::Postscript, None)
        );
        assert_eq!(
            infer(&[("a.tex", FileType::Latex2e), ("fig.ps", FileType::Postscript)]),
            (SourceType::Tex, None)
        );
        assert_eq!(
            infer(&[("a.tex", FileType::Latex2e), ("anc/x", FileType::Failed)]),
            (SourceType::Tex, None)
        );
    }

    #[test]
    fn recomputed_as_files_change() {
        let mut h = Harness::new();
        h.add("a.tex", b"\\documentclass{article}\n");
        let checkers = only(InferSourceType, true);
        h.run(&checkers);
        assert_eq!(h.contents.source_type, SourceType::Tex);

        let key = h.contents.index.resolve("a.tex").unwrap();
        h.contents.remove(&h.storage, &key).unwrap();
        h.run(&checkers);
        assert_eq!(h.contents.source_type, SourceType::Invalid);
    }

    #[test]
    fn unknown_single_file_reported_with_its_path() {
        let mut h = Harness::new();
        h.add("notes", b"plain words\n");
        h.run(&only(InferSourceType, true));

        assert_eq!(h.contents.source_type, SourceType::Invalid);
        assert_eq!(h.contents.notices.len(), 1);
        assert_eq!(h.contents.notices[0].code, LogCode::UnknownFileType);
        assert_eq!(h.contents.notices[0].path.as_deref(), Some("notes"));
    }
}
