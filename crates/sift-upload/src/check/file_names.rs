use once_cell::sync::Lazy;
use regex::Regex;

use super::{CheckContext, CheckResult, Checker};
use crate::log::LogCode;
use crate::record::FileRecord;

static TEX_BACKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+)\.(tex_|tex\.bak|tex~)$").expect("valid regex"));

pub struct WarnAboutTexBackupFiles;

impl Checker for WarnAboutTexBackupFiles {
    fn name(&self) -> &'static str {
        "WarnAboutTexBackupFiles"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        if !file.is_ancillary() && TEX_BACKUP.is_match(file.name()) {
            ctx.warn(
                LogCode::TexBackupFile,
                format!(
                    "File '{}' may be a backup file. Please inspect and remove extraneous \
                     backup files.",
                    file.name()
                ),
            );
        }
        Ok(())
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.' | '=' | ',')
}

/// `path` with every character outside the allowed set replaced by `_`, or
/// `None` when it is already clean.
fn clean_path(path: &str) -> Option<String> {
    if path.split('/').flat_map(str::chars).all(is_allowed) {
        return None;
    }
    let cleaned = path
        .split('/')
        .map(|segment| {
            segment
                .chars()
                .map(|c| if is_allowed(c) { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/");
    Some(cleaned)
}

/// Renames files whose paths contain characters TeX tooling mishandles.
pub struct ReplaceIllegalCharacters;

impl Checker for ReplaceIllegalCharacters {
    fn name(&self) -> &'static str {
        "ReplaceIllegalCharacters"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let Some(cleaned) = clean_path(&file.path) else {
            return Ok(());
        };
        let renamed = ctx.rename(&cleaned)?;
        ctx.warn(
            LogCode::IllegalCharacters,
            format!(
                "We only accept file names containing the characters: a-z A-Z 0-9 _ + - . , = \
                 Renamed '{}' to '{}'.",
                file.path, renamed.path
            ),
        );
        Ok(())
    }
}
