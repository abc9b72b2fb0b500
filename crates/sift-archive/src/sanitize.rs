//! Path sanitization for archive entries and uploaded file names.
//!
//! Every path that enters a workspace passes through [`sanitize`] first. The
//! output is a relative, `/`-separated path with no `..`, no empty or `.`
//! segments, no backslash, colon or control character, and no segment that
//! starts with `-`. Sanitizing an already sanitized path returns it unchanged.

use crate::entry::DiagnosticCode;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathWarning {
    pub code: DiagnosticCode,
    pub message: String,
}

/// Result of sanitizing a raw path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sanitized {
    pub path: String,
    pub warnings: Vec<PathWarning>,
}

pub fn sanitize(raw: &str) -> Result<Sanitized> {
    let mut warnings = Vec::new();

    let mut working = raw.to_string();
    if let Some(rest) = strip_drive_letter(&working) {
        working = rest.replace('\\', "/");
        warnings.push(PathWarning {
            code: DiagnosticCode::AbsolutePath,
            message: format!("rewrote drive-letter path '{raw}' as relative"),
        });
    }

    let trimmed = working.trim_start_matches(['/', '\\']);
    if trimmed.len() != working.len() && warnings.is_empty() {
        warnings.push(PathWarning {
            code: DiagnosticCode::AbsolutePath,
            message: format!("rewrote absolute path '{raw}' as relative"),
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    let mut saw_parent = false;
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                saw_parent = true;
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if saw_parent {
        warnings.push(PathWarning {
            code: DiagnosticCode::PathTraversal,
            message: format!("removed parent-directory references from '{raw}'"),
        });
    }

    let mut renamed = false;
    let cleaned: Vec<String> = segments
        .iter()
        .map(|segment| {
            let fixed = clean_segment(segment);
            renamed |= fixed != *segment;
            fixed
        })
        .collect();

    let path = cleaned.join("/");
    if path.is_empty() || path == "." || path == ".." {
        return Err(Error::InvalidPath(raw.to_string()));
    }

    if renamed {
        warnings.push(PathWarning {
            code: DiagnosticCode::IllegalCharacters,
            message: format!("renamed '{raw}' to '{path}'"),
        });
    }

    Ok(Sanitized { path, warnings })
}

fn strip_drive_letter(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let is_drive = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\');
    is_drive.then(|| path[2..].to_string())
}

fn clean_segment(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            ':' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if out.starts_with('-') {
        out.replace_range(..1, "_");
    }
    out
}

/// Picks a free name for `path` by appending `_N` to its stem.
///
/// Returns `path` itself when it is not taken. Otherwise `_1`, `_2`, ... is
/// inserted before the extension until `is_taken` reports a free name.
pub fn disambiguate(path: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(path) {
        return path.to_string();
    }

    let (dir, file) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    let (stem, ext) = match file.rfind('.') {
        Some(i) if i > 0 => (&file[..i], &file[i..]),
        _ => (file, ""),
    };

    (1u32..)
        .map(|n| format!("{dir}{stem}_{n}{ext}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| path.to_string())
}

/// Key used to detect collisions on a case-insensitive target.
pub fn fold_case(path: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        path.to_lowercase()
    } else {
        path.to_string()
    }
}

/// Resolves a symlink target relative to the directory holding the link.
///
/// Absolute targets and targets that climb out of the archive root yield
/// `None`. The returned path is sanitized so that it can be compared against
/// sanitized entry paths.
pub fn resolve_link_target(link_path: &str, target: &str) -> Option<String> {
    let base = match link_path.rfind('/') {
        Some(i) => &link_path[..i],
        None => "",
    };
    resolve_from(base, target)
}

/// Resolves a hard link target, which tar records relative to the archive
/// root.
pub fn resolve_hardlink_target(target: &str) -> Option<String> {
    resolve_from("", target)
}

fn resolve_from(base: &str, target: &str) -> Option<String> {
    if target.starts_with(['/', '\\']) || strip_drive_letter(target).is_some() {
        return None;
    }

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    sanitize(&segments.join("/")).ok().map(|s| s.path)
}

/// Removes `count` leading segments. `None` if nothing would remain.
pub fn strip_components(path: &str, count: usize) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() <= count {
        return None;
    }
    Some(segments[count..].join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str) -> String {
        sanitize(raw).unwrap().path
    }

    #[test]
    fn plain_path_untouched() {
        let s = sanitize("figs/plot.eps").unwrap();
        assert_eq!(s.path, "figs/plot.eps");
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn drive_letter_rewritten() {
        let s = sanitize("C:\\work\\paper.tex").unwrap();
        assert_eq!(s.path, "work/paper.tex");
        assert_eq!(s.warnings.len(), 1);
        assert_eq!(s.warnings[0].code, DiagnosticCode::AbsolutePath);

        let again = sanitize(&s.path).unwrap();
        assert_eq!(again.path, s.path);
        assert!(again.warnings.is_empty());
    }

    #[test]
    fn lowercase_drive_with_forward_slash() {
        assert_eq!(clean("c:/tmp/a.tex"), "tmp/a.tex");
    }

    #[test]
    fn leading_slash_rewritten() {
        let s = sanitize("/etc/passwd").unwrap();
        assert_eq!(s.path, "etc/passwd");
        assert_eq!(s.warnings[0].code, DiagnosticCode::AbsolutePath);
    }

    #[test]
    fn traversal_collapsed_and_stripped() {
        let s = sanitize("../../etc/passwd").unwrap();
        assert_eq!(s.path, "etc/passwd");
        assert_eq!(s.warnings.len(), 1);
        assert_eq!(s.warnings[0].code, DiagnosticCode::PathTraversal);

        assert_eq!(clean("a/b/../c"), "a/c");
        assert_eq!(clean("./a//b/./c"), "a/b/c");
    }

    #[test]
    fn illegal_characters_replaced() {
        let s = sanitize("dir/we:ird\\name\u{7}.tex").unwrap();
        assert_eq!(s.path, "dir/we_ird_name_.tex");
        assert_eq!(s.warnings[0].code, DiagnosticCode::IllegalCharacters);
    }

    #[test]
    fn leading_hyphen_replaced() {
        assert_eq!(clean("-rf/-x.tex"), "_rf/_x.tex");
    }

    #[test]
    fn empty_results_rejected() {
        for raw in ["", ".", "..", "/", "./..", "a/.."] {
            assert!(
                matches!(sanitize(raw), Err(Error::InvalidPath(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn output_properties_hold() {
        let inputs = [
            "C:\\a\\..\\..\\b",
            "\\\\server\\share\\f.tex",
            "a/../../../x/./y",
            "-/--/:/x",
            "ok/name.tex",
            "/abs/./../rel\\x",
        ];
        for raw in inputs {
            let out = clean(raw);
            assert!(!out.split('/').any(|s| s == ".."), "{out}");
            assert!(!out.starts_with('/'), "{out}");
            assert!(!out.contains('\\'), "{out}");
            assert_eq!(clean(&out), out);
        }
    }

    #[test]
    fn disambiguate_appends_suffix() {
        let taken = ["a/main.tex", "a/main_1.tex"];
        let picked = disambiguate("a/main.tex", |p| taken.contains(&p));
        assert_eq!(picked, "a/main_2.tex");

        assert_eq!(disambiguate("README", |p| p == "README"), "README_1");
        assert_eq!(disambiguate(".bashrc", |p| p == ".bashrc"), ".bashrc_1");
        assert_eq!(disambiguate("free.tex", |_| false), "free.tex");
    }

    #[test]
    fn fold_case_only_when_configured() {
        assert_eq!(fold_case("Main.TEX", true), "main.tex");
        assert_eq!(fold_case("Main.TEX", false), "Main.TEX");
    }

    #[test]
    fn link_targets_resolved_inside_root() {
        assert_eq!(
            resolve_link_target("figs/link.eps", "../data/plot.eps").as_deref(),
            Some("data/plot.eps")
        );
        assert_eq!(
            resolve_link_target("link.eps", "plot.eps").as_deref(),
            Some("plot.eps")
        );
        assert_eq!(resolve_link_target("figs/link", "../../etc/passwd"), None);
        assert_eq!(resolve_link_target("link", "/etc/passwd"), None);
        assert_eq!(resolve_link_target("link", "C:\\x"), None);
        assert_eq!(
            resolve_hardlink_target("dir/a.tex").as_deref(),
            Some("dir/a.tex")
        );
    }

    #[test]
    fn component_stripping() {
        assert_eq!(strip_components("a/b/c/d", 2).as_deref(), Some("c/d"));
        assert_eq!(strip_components("a", 1), None);
    }
}
