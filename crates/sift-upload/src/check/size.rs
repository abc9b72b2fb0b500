use super::{CheckContext, CheckResult, Checker};
use crate::log::{LogCode, Severity};
use crate::record::FileRecord;

fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

pub struct CheckFileSize;

impl Checker for CheckFileSize {
    fn name(&self) -> &'static str {
        "CheckFileSize"
    }

    fn check_finally(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let limit = ctx.settings().max_file_bytes;
        if file.size > limit {
            ctx.error(
                LogCode::FileTooLarge,
                format!(
                    "'{}' is {}, larger than the {} allowed for a single file.",
                    file.name(),
                    mib(file.size),
                    mib(limit)
                ),
            );
        }
        Ok(())
    }
}

/// Limits the combined size of source and ancillary files.
pub struct CheckPackageSize;

impl Checker for CheckPackageSize {
    fn name(&self) -> &'static str {
        "CheckPackageSize"
    }

    fn check_workspace(&self, ctx: &mut CheckContext<'_>) -> CheckResult {
        let limit = ctx.settings().max_package_bytes;
        let total: u64 = ctx.index().active().map(|r| r.size).sum();
        if total > limit {
            ctx.log_workspace(
                Severity::Error,
                LogCode::PackageTooLarge,
                format!(
                    "The submission is {}, larger than the {} allowed.",
                    mib(total),
                    mib(limit)
                ),
            );
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
    fn oversized_file_is_an_error() {
        let mut h = Harness::new();
        h.settings.max_file_bytes = 4;
        h.add("small.txt", b"1234");
        h.add("big.txt", b"12345");
        h.run(&CheckerSet::empty().register(CheckFileSize));

        assert_eq!(h.codes(), [(Severity::Error, LogCode::FileTooLarge)]);
        assert_eq!(h.contents.log[0].path.as_deref(), Some("big.txt"));
    }

    #[test]
    fn package_total_counts_active_files_only() {
        let mut h = Harness::new();
        h.settings.max_package_bytes = 8;
        h.add("a.txt", b"12345");
        h.add("anc/b.txt", b"1234");
        h.run(&CheckerSet::empty().register(CheckPackageSize));

        assert_eq!(h.codes(), [(Severity::Error, LogCode::PackageTooLarge)]);
        assert_eq!(h.contents.notices.len(), 1);
        assert!(h.contents.log[0].path.is_none());
        assert!(h.contents.has_errors());
    }

    #[test]
    fn removed_files_do_not_count() {
        let mut h = Harness::new();
        h.settings.max_package_bytes = 8;
        h.add("a.txt", b"12345");
        h.add(".hidden", b"1234");
        h.run(
            &CheckerSet::empty()
                .register(crate::check::RemoveHiddenFiles)
                .register(CheckPackageSize),
        );

        assert!(!h.codes().contains(&(Severity::Error, LogCode::PackageTooLarge)));
    }
}
